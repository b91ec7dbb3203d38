//! Frame timing statistics shown in the stats panel

use instant::Instant;
use std::time::Duration;

/// Window over which frames per second are averaged
const FPS_WINDOW: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct FrameStats {
    frames: u64,
    frame_start: Option<Instant>,
    last_frame_time: Duration,
    window_start: Option<Instant>,
    window_frames: u32,
    fps: f32,
}

impl FrameStats {
    pub fn new() -> Self {
        Self {
            frames: 0,
            frame_start: None,
            last_frame_time: Duration::ZERO,
            window_start: None,
            window_frames: 0,
            fps: 0.0,
        }
    }

    pub fn begin(&mut self) {
        let now = Instant::now();
        self.frame_start = Some(now);
        if self.window_start.is_none() {
            self.window_start = Some(now);
        }
    }

    pub fn end(&mut self) {
        let now = Instant::now();
        if let Some(start) = self.frame_start.take() {
            self.last_frame_time = now.duration_since(start);
        }
        self.frames += 1;
        self.window_frames += 1;

        if let Some(window_start) = self.window_start {
            let elapsed = now.duration_since(window_start);
            if elapsed >= FPS_WINDOW {
                self.fps = self.window_frames as f32 / elapsed.as_secs_f32();
                self.window_frames = 0;
                self.window_start = Some(now);
            }
        }
    }

    /// Frames completed since creation
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Average over the last full window, 0 until one has elapsed
    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn last_frame_time(&self) -> Duration {
        self.last_frame_time
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_frames() {
        let mut stats = FrameStats::new();
        for _ in 0..3 {
            stats.begin();
            stats.end();
        }
        assert_eq!(stats.frames(), 3);
        assert!(stats.last_frame_time() < FPS_WINDOW);
    }

    #[test]
    fn test_end_without_begin() {
        let mut stats = FrameStats::default();
        stats.end();
        assert_eq!(stats.frames(), 1);
        assert_eq!(stats.fps(), 0.0);
    }
}
