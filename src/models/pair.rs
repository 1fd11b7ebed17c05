//! Canonical ordering for unordered user pairs.

use uuid::Uuid;

/// Order two user ids deterministically, smaller one first.
///
/// Partnerships are stored and live plays are matched with the pair in this
/// canonical order, so {a, b} and {b, a} always hit the same rows. Every
/// comparison or write involving an unordered pair must go through here.
pub fn ordered_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::ordered_pair;

    #[test]
    fn order_insensitive() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(ordered_pair(a, b), ordered_pair(b, a));
    }

    #[test]
    fn smaller_id_comes_first() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (first, second) = ordered_pair(a, b);
        assert!(first <= second);
        assert_eq!(ordered_pair(a, a), (a, a));
    }
}
