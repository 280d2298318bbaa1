use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// A sparse set over the whole signed 32-bit domain.
///
/// Values are stored as disjoint, non-adjacent inclusive ranges keyed by their
/// start, so reserving `0 to max` costs a single entry. Field numbers only use
/// `1..=MAX_FIELD_NUMBER`, while enum values may be anywhere in `i32`, negative
/// values included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ReservedNumbers {
    ranges: BTreeMap<i32, i32>,
}

impl ReservedNumbers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a single value. Returns `false` if it was already present.
    pub fn insert(&mut self, value: i32) -> bool {
        self.insert_range(value, value)
    }

    /// Adds every value of the inclusive range `from..=to`. The bounds may be
    /// given in either order. Returns `false` if nothing new was added.
    pub fn insert_range(&mut self, from: i32, to: i32) -> bool {
        let (from, to) = if from <= to { (from, to) } else { (to, from) };
        if self.contains_range(from, to) {
            return false;
        }

        let mut start = from as i64;
        let mut end = to as i64;
        let mut absorbed = Vec::new();

        // Walk backwards over every range that overlaps or touches `from..=to`
        let upper = to.saturating_add(1);
        for (&s, &e) in self.ranges.range(..=upper).rev() {
            if (e as i64) < start - 1 {
                break;
            }
            absorbed.push(s);
            start = start.min(s as i64);
            end = end.max(e as i64);
        }
        for s in absorbed {
            self.ranges.remove(&s);
        }
        self.ranges.insert(start as i32, end as i32);
        true
    }

    /// Adds every value of `other`.
    pub fn extend(&mut self, other: &ReservedNumbers) {
        for (from, to) in other.ranges() {
            self.insert_range(from, to);
        }
    }

    pub fn contains(&self, value: i32) -> bool {
        self.ranges
            .range(..=value)
            .next_back()
            .is_some_and(|(_, &end)| value <= end)
    }

    /// True when every value of `from..=to` is present.
    pub fn contains_range(&self, from: i32, to: i32) -> bool {
        self.ranges
            .range(..=from)
            .next_back()
            .is_some_and(|(_, &end)| to <= end)
    }

    /// First value of `from..=to` that is present, if any.
    pub fn first_in_range(&self, from: i32, to: i32) -> Option<i32> {
        self.next_set_bit(from).filter(|&n| n <= to)
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of values in the set.
    pub fn len(&self) -> u64 {
        self.ranges
            .iter()
            .map(|(&s, &e)| (e as i64 - s as i64 + 1) as u64)
            .sum()
    }

    /// Smallest present value that is `>= from`.
    pub fn next_set_bit(&self, from: i32) -> Option<i32> {
        if self.contains(from) {
            return Some(from);
        }
        self.ranges.range(from..).next().map(|(&s, _)| s)
    }

    /// Smallest absent value that is `>= from`, or `None` when everything from
    /// `from` up to `i32::MAX` is present.
    pub fn next_clear_bit(&self, from: i32) -> Option<i32> {
        match self.ranges.range(..=from).next_back() {
            Some((_, &end)) if end >= from => end.checked_add(1),
            _ => Some(from),
        }
    }

    /// The stored inclusive ranges, in ascending order.
    pub fn ranges(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.ranges.iter().map(|(&s, &e)| (s, e))
    }

    /// Every value in ascending order. Beware of large ranges.
    pub fn values(&self) -> impl Iterator<Item = i32> + '_ {
        self.ranges().flat_map(|(s, e)| s..=e)
    }

    /// Values present in `self` but not in `other`.
    pub fn difference(&self, other: &ReservedNumbers) -> ReservedNumbers {
        let mut out = ReservedNumbers::new();
        for (from, to) in self.ranges() {
            let mut pos = from;
            loop {
                if other.contains(pos) {
                    match other.next_clear_bit(pos) {
                        Some(next) if next <= to => pos = next,
                        _ => break,
                    }
                }
                let gap_end = match other.next_set_bit(pos) {
                    Some(n) if n <= to => n - 1,
                    _ => to,
                };
                out.insert_range(pos, gap_end);
                if gap_end >= to {
                    break;
                }
                pos = gap_end + 1;
            }
        }
        out
    }

    /// Renders the set in declaration syntax, writing `max` for a range that
    /// ends at `max`.
    pub fn to_declaration(&self, max: i32) -> String {
        let mut parts = Vec::new();
        let mut cursor = self.ranges.keys().next().copied();
        while let Some(start) = cursor.and_then(|c| self.next_set_bit(c)) {
            let end = match self.next_clear_bit(start) {
                Some(clear) => clear - 1,
                None => i32::MAX,
            };
            parts.push(match (start == end, end == max) {
                (true, _) => start.to_string(),
                (false, true) => format!("{} to max", start),
                (false, false) => format!("{} to {}", start, end),
            });
            cursor = end.checked_add(1);
        }
        parts.join(", ")
    }
}

impl fmt::Display for ReservedNumbers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (s, e) in self.ranges() {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            if s == e {
                write!(f, "{}", s)?;
            } else {
                write!(f, "{} to {}", s, e)?;
            }
        }
        Ok(())
    }
}

impl FromIterator<i32> for ReservedNumbers {
    fn from_iter<T: IntoIterator<Item = i32>>(iter: T) -> Self {
        let mut set = ReservedNumbers::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

impl Serialize for ReservedNumbers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.ranges().map(|(s, e)| [s, e]))
    }
}
