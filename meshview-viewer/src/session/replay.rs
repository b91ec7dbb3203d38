//! Re-applying persisted settings after a load

use super::ModelSession;
use crate::error::{Result, SessionError};
use crate::settings::InteractionSettings;

pub type ReplayFn = fn(&ModelSession, &InteractionSettings) -> Result<()>;

/// Field name and toggle for every persisted setting, in replay order
pub const REPLAY_TABLE: [(&str, ReplayFn); 7] = [
    ("wireframe", replay_wireframe),
    ("normal", replay_normal),
    ("animation", replay_animation),
    ("axesHelper", replay_axes_helper),
    ("gridHelper", replay_grid_helper),
    ("boundingBoxHelper", replay_bounding_box_helper),
    ("bgcolor", replay_bgcolor),
];

fn replay_wireframe(session: &ModelSession, settings: &InteractionSettings) -> Result<()> {
    session.change_wireframe(settings.wireframe)
}

fn replay_normal(session: &ModelSession, settings: &InteractionSettings) -> Result<()> {
    session.change_normal(settings.normal)
}

fn replay_animation(session: &ModelSession, settings: &InteractionSettings) -> Result<()> {
    session.change_animation(settings.animation)
}

fn replay_axes_helper(session: &ModelSession, settings: &InteractionSettings) -> Result<()> {
    session.change_axes_helper(settings.axes_helper)
}

fn replay_grid_helper(session: &ModelSession, settings: &InteractionSettings) -> Result<()> {
    session.change_grid_helper(settings.grid_helper)
}

fn replay_bounding_box_helper(session: &ModelSession, settings: &InteractionSettings) -> Result<()> {
    session.change_bounding_box_helper(settings.bounding_box_helper)
}

fn replay_bgcolor(session: &ModelSession, settings: &InteractionSettings) -> Result<()> {
    session.change_bgcolor(&settings.bgcolor)
}

/// Run every entry of [`REPLAY_TABLE`] against the settings the session
/// held when the load finished. A failing field is recorded and skipped.
pub(crate) fn replay(session: &ModelSession) {
    let settings = session.settings();
    for (field, apply) in REPLAY_TABLE {
        if let Err(e) = apply(session, &settings) {
            let failure = SessionError::ReplayFailure {
                field,
                source: Box::new(e),
            };
            log::warn!("{}", failure);
            session.record_replay_failure(failure.to_string());
        }
    }
}
