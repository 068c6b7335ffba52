use std::{
    fmt,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

/// A branch target. Rendered as `LBL_<n>`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(u32);

impl Label {
    pub const fn new(n: u32) -> Label {
        Label(n)
    }

    pub const fn number(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LBL_{}", self.0)
    }
}

/// Hands out labels that are never repeated by the same source.
///
/// A single source must be shared by every unit linked into the same program,
/// since the target's labels are global.
pub trait LabelSource {
    fn next_label(&mut self) -> Label;
}

/// Single-threaded label source.
#[derive(Debug, Default)]
pub struct LabelCounter {
    next: u32,
}

impl LabelCounter {
    pub fn new() -> LabelCounter {
        LabelCounter::default()
    }

    pub fn starting_at(n: u32) -> LabelCounter {
        LabelCounter { next: n }
    }

    /// How many labels were handed out so far (counting from the start value).
    pub fn allocated(&self) -> u32 {
        self.next
    }
}

impl LabelSource for LabelCounter {
    fn next_label(&mut self) -> Label {
        let label = Label(self.next);
        self.next = self
            .next
            .checked_add(1)
            .expect("label space should not be exhausted");
        label
    }
}

/// Label source which may be cloned into several threads. All clones draw
/// from the same sequence.
#[derive(Clone, Debug, Default)]
pub struct SharedLabels(Arc<AtomicU32>);

impl SharedLabels {
    pub fn new() -> SharedLabels {
        SharedLabels::default()
    }
}

impl LabelSource for SharedLabels {
    fn next_label(&mut self) -> Label {
        Label(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashSet, thread};

    #[test]
    fn counter_is_monotonic() {
        let mut labels = LabelCounter::new();
        let drawn: Vec<_> = (0..4).map(|_| labels.next_label()).collect();
        assert_eq!(drawn, [Label(0), Label(1), Label(2), Label(3)]);
        assert_eq!(labels.allocated(), 4);
        assert_eq!(drawn[3].to_string(), "LBL_3");
    }

    #[test]
    fn counter_starting_at() {
        let mut labels = LabelCounter::starting_at(10);
        assert_eq!(labels.next_label().to_string(), "LBL_10");
    }

    #[test]
    fn shared_labels_are_unique_across_threads() {
        let labels = SharedLabels::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let mut labels = labels.clone();
                thread::spawn(move || (0..100).map(|_| labels.next_label()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for label in handle.join().unwrap() {
                assert!(seen.insert(label), "{label} handed out twice");
            }
        }
        assert_eq!(seen.len(), 400);
    }
}
