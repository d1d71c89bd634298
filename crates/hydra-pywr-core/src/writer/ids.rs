/// Allocates local ids for a network that has not been posted yet.
///
/// Local ids are negative: each counter starts at 0 and is decremented
/// before being handed out, so the first id is `-1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdAllocator {
    node: i64,
    link: i64,
    attr: i64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_node(&mut self) -> i64 {
        self.node -= 1;
        self.node
    }

    pub fn next_link(&mut self) -> i64 {
        self.link -= 1;
        self.link
    }

    pub fn next_attr(&mut self) -> i64 {
        self.attr -= 1;
        self.attr
    }

    /// Continues from another allocator so both share one id space.
    pub fn continue_from(&mut self, other: &IdAllocator) {
        *self = *other;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_ids_are_minus_one() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.next_node(), -1);
        assert_eq!(ids.next_link(), -1);
        assert_eq!(ids.next_attr(), -1);
        assert_eq!(ids.next_attr(), -2);
    }

    #[test]
    fn test_continue_from_shares_space() {
        let mut first = IdAllocator::new();
        first.next_node();
        first.next_attr();
        first.next_attr();

        let mut second = IdAllocator::new();
        second.continue_from(&first);
        assert_eq!(second.next_node(), -2);
        assert_eq!(second.next_link(), -1);
        assert_eq!(second.next_attr(), -3);
    }
}
