//! Display surfaces a session attaches to

use std::cell::RefCell;
use std::rc::Rc;

/// What a session places on its mount target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountChild {
    Canvas { width: u32, height: u32 },
    StatsPanel,
}

/// A surface owned by the host. Sessions only append and clear children.
pub trait MountTarget {
    /// Current size in pixels
    fn size(&self) -> (u32, u32);

    fn append_child(&mut self, child: MountChild);

    fn clear_children(&mut self);

    fn children(&self) -> &[MountChild];
}

pub type SharedMount = Rc<RefCell<dyn MountTarget>>;

/// Off-screen mount target
#[derive(Debug, Clone)]
pub struct HeadlessMount {
    width: u32,
    height: u32,
    children: Vec<MountChild>,
}

impl HeadlessMount {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            children: Vec::new(),
        }
    }

    /// Wrap in the shared handle sessions expect
    pub fn shared(width: u32, height: u32) -> Rc<RefCell<HeadlessMount>> {
        Rc::new(RefCell::new(Self::new(width, height)))
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }
}

impl Default for HeadlessMount {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

impl MountTarget for HeadlessMount {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn append_child(&mut self, child: MountChild) {
        self.children.push(child);
    }

    fn clear_children(&mut self) {
        self.children.clear();
    }

    fn children(&self) -> &[MountChild] {
        &self.children
    }
}
