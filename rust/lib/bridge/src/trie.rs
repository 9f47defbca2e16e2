use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Pattern table shared by store listeners and channel handlers.
///
/// Keys are split on `/`. A pattern segment of `+` matches exactly one
/// level, a trailing `#` matches any number of remaining levels (including
/// none). Plain keys without wildcards match only themselves, which is the
/// common case for both store keys and channel names.
///
/// Values registered under the same pattern keep their insertion order.
/// `matches` returns clones, so callers can invoke them without holding
/// the lock.
pub struct Trie<T> {
    root: RwLock<Node<T>>,
}

struct Node<T> {
    children: HashMap<String, Node<T>>,
    single: Option<Box<Node<T>>>,
    multi: Option<Box<Node<T>>>,
    values: Vec<T>,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self {
            children: HashMap::new(),
            single: None,
            multi: None,
            values: Vec::new(),
        }
    }
}

impl<T: Clone> Trie<T> {
    pub fn new() -> Self {
        Self {
            root: RwLock::new(Node::default()),
        }
    }

    /// Append a value under `pattern`.
    pub fn insert(&self, pattern: &str, value: T) {
        let mut root = self.root.write().unwrap_or_else(PoisonError::into_inner);
        root.insert(pattern, value);
    }

    /// Clone out every value whose pattern matches the concrete `key`.
    ///
    /// Order is by trie position (exact, then `+`, then `#`), not by
    /// insertion across patterns; callers that need global insertion
    /// order sort the result.
    pub fn matches(&self, key: &str) -> Vec<T> {
        let root = self.root.read().unwrap_or_else(PoisonError::into_inner);
        let mut out = Vec::new();
        root.collect(key, &mut out);
        out
    }

    /// Remove values stored under exactly `pattern` for which `predicate`
    /// holds. Returns how many were removed.
    ///
    /// Removed values are dropped after the lock is released, so a value
    /// whose destructor touches this trie does not deadlock.
    pub fn remove<F>(&self, pattern: &str, predicate: F) -> usize
    where
        F: Fn(&T) -> bool,
    {
        let mut removed = Vec::new();
        {
            let mut root = self.root.write().unwrap_or_else(PoisonError::into_inner);
            root.remove(pattern, &predicate, &mut removed);
        }
        removed.len()
    }

    /// Remove values under any pattern for which `predicate` holds.
    pub fn remove_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&T) -> bool,
    {
        let mut removed = Vec::new();
        {
            let mut root = self.root.write().unwrap_or_else(PoisonError::into_inner);
            root.remove_where(&predicate, &mut removed);
        }
        removed.len()
    }

    /// Total number of stored values.
    pub fn len(&self) -> usize {
        self.count_where(|_| true)
    }

    /// Number of stored values, under any pattern, satisfying `predicate`.
    pub fn count_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&T) -> bool,
    {
        let root = self.root.read().unwrap_or_else(PoisonError::into_inner);
        root.count(&predicate)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Default for Trie<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Node<T> {
    fn insert(&mut self, pattern: &str, value: T) {
        let (first, rest) = split_first(pattern);
        let child = match first {
            // `#` swallows whatever follows it.
            "#" => {
                self.multi
                    .get_or_insert_with(Box::default)
                    .values
                    .push(value);
                return;
            }
            "+" => &mut **self.single.get_or_insert_with(Box::default),
            segment => self.children.entry(segment.to_string()).or_default(),
        };
        match rest {
            Some(rest) => child.insert(rest, value),
            None => child.values.push(value),
        }
    }

    fn collect(&self, key: &str, out: &mut Vec<T>) {
        let (first, rest) = split_first(key);
        if let Some(child) = self.children.get(first) {
            child.collect_rest(rest, out);
        }
        if let Some(single) = &self.single {
            single.collect_rest(rest, out);
        }
        if let Some(multi) = &self.multi {
            out.extend(multi.values.iter().cloned());
        }
    }

    /// Continue matching below this node. `None` means the key ended here.
    fn collect_rest(&self, rest: Option<&str>, out: &mut Vec<T>) {
        match rest {
            Some(rest) => self.collect(rest, out),
            None => {
                out.extend(self.values.iter().cloned());
                if let Some(multi) = &self.multi {
                    out.extend(multi.values.iter().cloned());
                }
            }
        }
    }

    fn remove<F>(&mut self, pattern: &str, predicate: &F, removed: &mut Vec<T>)
    where
        F: Fn(&T) -> bool,
    {
        let (first, rest) = split_first(pattern);
        let child = match first {
            "#" => {
                if let Some(multi) = &mut self.multi {
                    take_matching(&mut multi.values, predicate, removed);
                }
                return;
            }
            "+" => self.single.as_deref_mut(),
            segment => self.children.get_mut(segment),
        };
        let Some(child) = child else {
            return;
        };
        match rest {
            Some(rest) => child.remove(rest, predicate, removed),
            None => take_matching(&mut child.values, predicate, removed),
        }
    }

    fn remove_where<F>(&mut self, predicate: &F, removed: &mut Vec<T>)
    where
        F: Fn(&T) -> bool,
    {
        take_matching(&mut self.values, predicate, removed);
        for child in self.children.values_mut() {
            child.remove_where(predicate, removed);
        }
        if let Some(single) = &mut self.single {
            single.remove_where(predicate, removed);
        }
        if let Some(multi) = &mut self.multi {
            multi.remove_where(predicate, removed);
        }
    }

    fn count<F>(&self, predicate: &F) -> usize
    where
        F: Fn(&T) -> bool,
    {
        self.values.iter().filter(|v| predicate(*v)).count()
            + self
                .children
                .values()
                .map(|c| c.count(predicate))
                .sum::<usize>()
            + self.single.as_ref().map_or(0, |c| c.count(predicate))
            + self.multi.as_ref().map_or(0, |c| c.count(predicate))
    }
}

/// Move values matching `predicate` into `out`, keeping the order of the rest.
fn take_matching<T, F>(values: &mut Vec<T>, predicate: &F, out: &mut Vec<T>)
where
    F: Fn(&T) -> bool,
{
    let mut i = 0;
    while i < values.len() {
        if predicate(&values[i]) {
            out.push(values.remove(i));
        } else {
            i += 1;
        }
    }
}

/// Split `a/b/c` into (`a`, `Some("b/c")`). A trailing `/` leaves an
/// empty last level, so `a/` is (`a`, `Some("")`), distinct from `a`.
fn split_first(path: &str) -> (&str, Option<&str>) {
    match path.split_once('/') {
        Some((first, rest)) => (first, Some(rest)),
        None => (path, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut v: Vec<u32>) -> Vec<u32> {
        v.sort();
        v
    }

    // ========================================================================
    // Exact keys
    // ========================================================================

    #[test]
    fn flat_key_matches_itself_only() {
        let trie = Trie::new();
        trie.insert("cartItemCount", 1u32);
        assert_eq!(trie.matches("cartItemCount"), vec![1]);
        assert!(trie.matches("cartItem").is_empty());
        assert!(trie.matches("cartItemCount/x").is_empty());
    }

    #[test]
    fn same_pattern_keeps_insertion_order() {
        let trie = Trie::new();
        trie.insert("add_to_cart", 3u32);
        trie.insert("add_to_cart", 1u32);
        trie.insert("add_to_cart", 2u32);
        assert_eq!(trie.matches("add_to_cart"), vec![3, 1, 2]);
    }

    #[test]
    fn nested_exact_path() {
        let trie = Trie::new();
        trie.insert("widget/cart_badge", 1u32);
        assert_eq!(trie.matches("widget/cart_badge"), vec![1]);
        assert!(trie.matches("widget").is_empty());
    }

    // ========================================================================
    // Wildcards
    // ========================================================================

    #[test]
    fn single_level_wildcard() {
        let trie = Trie::new();
        trie.insert("cart/+", 1u32);
        assert_eq!(trie.matches("cart/lines"), vec![1]);
        assert!(trie.matches("cart").is_empty());
        assert!(trie.matches("cart/lines/0").is_empty());
    }

    #[test]
    fn multi_level_wildcard_includes_parent() {
        let trie = Trie::new();
        trie.insert("cart/#", 1u32);
        assert_eq!(trie.matches("cart"), vec![1]);
        assert_eq!(trie.matches("cart/lines/0"), vec![1]);
        assert!(trie.matches("carts").is_empty());
    }

    #[test]
    fn root_wildcard_matches_everything() {
        let trie = Trie::new();
        trie.insert("#", 9u32);
        assert_eq!(trie.matches("anything"), vec![9]);
        assert_eq!(trie.matches("a/b/c"), vec![9]);
    }

    #[test]
    fn combined_patterns_all_match() {
        let trie = Trie::new();
        trie.insert("cart/lines", 1u32);
        trie.insert("cart/+", 2u32);
        trie.insert("cart/#", 3u32);
        trie.insert("#", 4u32);
        trie.insert("home/+", 5u32);
        assert_eq!(sorted(trie.matches("cart/lines")), vec![1, 2, 3, 4]);
    }

    #[test]
    fn empty_trie_matches_nothing() {
        let trie: Trie<u32> = Trie::new();
        assert!(trie.matches("x").is_empty());
        assert!(trie.is_empty());
    }

    // ========================================================================
    // Removal
    // ========================================================================

    #[test]
    fn remove_by_predicate_on_pattern() {
        let trie = Trie::new();
        trie.insert("open_cart", 1u32);
        trie.insert("open_cart", 2u32);
        assert_eq!(trie.remove("open_cart", |v| *v == 1), 1);
        assert_eq!(trie.matches("open_cart"), vec![2]);
    }

    #[test]
    fn remove_unknown_pattern_is_zero() {
        let trie = Trie::new();
        trie.insert("a", 1u32);
        assert_eq!(trie.remove("b", |_| true), 0);
        assert_eq!(trie.remove("+", |_| true), 0);
        assert_eq!(trie.remove("#", |_| true), 0);
    }

    #[test]
    fn remove_wildcard_patterns() {
        let trie = Trie::new();
        trie.insert("cart/+", 1u32);
        trie.insert("cart/#", 2u32);
        assert_eq!(trie.remove("cart/+", |_| true), 1);
        assert_eq!(trie.remove("cart/#", |_| true), 1);
        assert!(trie.matches("cart/lines").is_empty());
    }

    #[test]
    fn remove_where_spans_all_patterns() {
        let trie = Trie::new();
        trie.insert("a", 10u32);
        trie.insert("b/+", 11u32);
        trie.insert("c/#", 12u32);
        trie.insert("d", 20u32);
        assert_eq!(trie.remove_where(|v| *v < 20), 3);
        assert_eq!(trie.len(), 1);
        assert_eq!(trie.matches("d"), vec![20]);
    }

    #[test]
    fn remove_then_len() {
        let trie = Trie::new();
        trie.insert("x/+", 1u32);
        trie.insert("#", 2u32);
        assert_eq!(trie.len(), 2);

        assert_eq!(trie.remove("x/+", |_| true), 1);
        assert_eq!(trie.len(), 1);
        assert_eq!(trie.matches("x/y"), vec![2]);
    }

    #[test]
    fn split_first_cases() {
        assert_eq!(split_first("a/b/c"), ("a", Some("b/c")));
        assert_eq!(split_first("a"), ("a", None));
        assert_eq!(split_first("a/"), ("a", Some("")));
        assert_eq!(split_first(""), ("", None));
    }

    // ========================================================================
    // Empty levels
    // ========================================================================

    #[test]
    fn trailing_slash_is_a_different_key() {
        let trie = Trie::new();
        trie.insert("cart", 1u32);
        trie.insert("cart/", 2u32);
        assert_eq!(trie.matches("cart"), vec![1]);
        assert_eq!(trie.matches("cart/"), vec![2]);
        assert!(trie.matches("cart//").is_empty());
    }

    #[test]
    fn trailing_slash_does_not_reach_parent_listener() {
        let trie = Trie::new();
        trie.insert("open_cart", 1u32);
        assert!(trie.matches("open_cart/").is_empty());
        assert!(trie.matches("/open_cart").is_empty());
    }

    #[test]
    fn empty_key_is_its_own_key() {
        let trie = Trie::new();
        trie.insert("", 1u32);
        assert_eq!(trie.matches(""), vec![1]);
        assert!(trie.matches("a").is_empty());
        assert_eq!(trie.remove("", |_| true), 1);
        assert!(trie.is_empty());
    }

    #[test]
    fn remove_trailing_slash_pattern_only() {
        let trie = Trie::new();
        trie.insert("cart", 1u32);
        trie.insert("cart/", 2u32);
        assert_eq!(trie.remove("cart/", |_| true), 1);
        assert_eq!(trie.matches("cart"), vec![1]);
        assert!(trie.matches("cart/").is_empty());
    }

    #[test]
    fn wildcards_see_empty_levels() {
        let trie = Trie::new();
        trie.insert("cart/+", 1u32);
        trie.insert("cart/#", 2u32);
        assert_eq!(sorted(trie.matches("cart/")), vec![1, 2]);
    }

    #[test]
    fn concurrent_insert_and_match() {
        use std::sync::Arc;
        use std::thread;

        let trie = Arc::new(Trie::new());
        let writers: Vec<_> = (0..4u32)
            .map(|t| {
                let trie = trie.clone();
                thread::spawn(move || {
                    for i in 0..50u32 {
                        trie.insert("shared", t * 100 + i);
                        let _ = trie.matches("shared");
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }
        assert_eq!(trie.matches("shared").len(), 200);
    }
}
