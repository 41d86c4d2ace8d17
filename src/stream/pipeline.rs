//! Filter/map stages applied to each message reaching a tap.

use crate::message::{Message, MessageRef};

type FilterFn = Box<dyn Fn(&dyn Message) -> bool + Send + Sync>;
type MapFn = Box<dyn Fn(&dyn Message) -> Option<MessageRef> + Send + Sync>;

enum Stage {
    Filter(FilterFn),
    Map(MapFn),
}

/// Ordered chain of stages. A message survives when every filter passes and
/// every map produces a value; the final value goes to the tap's sink.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&dyn Message) -> bool + Send + Sync + 'static,
    {
        self.stages.push(Stage::Filter(Box::new(predicate)));
        self
    }

    /// A map returning `None` drops the message.
    pub fn map<F>(mut self, map: F) -> Self
    where
        F: Fn(&dyn Message) -> Option<MessageRef> + Send + Sync + 'static,
    {
        self.stages.push(Stage::Map(Box::new(map)));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn run(&self, message: &MessageRef) -> Option<MessageRef> {
        let mut current = MessageRef::clone(message);
        for stage in &self.stages {
            match stage {
                Stage::Filter(predicate) => {
                    if !predicate(current.as_ref()) {
                        return None;
                    }
                }
                Stage::Map(map) => current = map(current.as_ref())?,
            }
        }
        Some(current)
    }
}
