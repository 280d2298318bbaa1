//! Merging of reservation declarations.
//!
//! A message or enum may collect its reserved numbers and names from several
//! places: each `reserved` statement in its body, or a list of ancestor types
//! supplied by the caller. Every place is a `ReservationSource`; the
//! `ReservedProcessor` merges them in order and rejects any number or name
//! reserved twice.

use crate::utils::quote;
use brine_proto_schema::{DescriptorError, ReservedNumbers};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// `from..=to`, where an open end means "up to the maximum of the domain".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservedRange {
    pub from: i32,
    pub to:   Option<i32>,
}

impl ReservedRange {
    pub fn single(number: i32) -> Self {
        ReservedRange {
            from: number,
            to:   Some(number),
        }
    }

    pub fn closed(from: i32, to: i32) -> Self {
        ReservedRange { from, to: Some(to) }
    }

    pub fn open(from: i32) -> Self {
        ReservedRange { from, to: None }
    }

    /// Inclusive bounds, closing an open range at `max`.
    pub fn bounds(&self, max: i32) -> (i32, i32) {
        (self.from, self.to.unwrap_or(max))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid reserved range {0}")]
pub struct InvalidRange(String);

impl FromStr for ReservedRange {
    type Err = InvalidRange;

    /// Parses `5`, `1..3` or the open form `9..`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidRange(quote(s));
        let text = s.trim();
        let Some((from, to)) = text.split_once("..") else {
            return text.parse().map(ReservedRange::single).map_err(|_| invalid());
        };
        let from: i32 = from.trim().parse().map_err(|_| invalid())?;
        let to = to.trim();
        if to.is_empty() {
            return Ok(ReservedRange::open(from));
        }
        let to: i32 = to.parse().map_err(|_| invalid())?;
        if to < from {
            return Err(invalid());
        }
        Ok(ReservedRange::closed(from, to))
    }
}

impl fmt::Display for ReservedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to {
            Some(to) if to == self.from => write!(f, "{}", self.from),
            Some(to) => write!(f, "{}..{}", self.from, to),
            None => write!(f, "{}..", self.from),
        }
    }
}

/// One place that reserves numbers and names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReservationSource {
    pub name:   String,
    pub ranges: Vec<ReservedRange>,
    pub names:  Vec<String>,
}

impl ReservationSource {
    pub fn new(name: impl Into<String>) -> Self {
        ReservationSource {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn range(mut self, range: ReservedRange) -> Self {
        self.ranges.push(range);
        self
    }

    pub fn reserved_name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ReservedProcessor {
    scope:         String,
    max:           i32,
    numbers:       ReservedNumbers,
    names:         BTreeSet<String>,
    number_owners: Vec<(i32, i32, String)>,
    name_owners:   Vec<(String, String)>,
}

impl ReservedProcessor {
    /// `max` closes open ranges: the largest field number for messages,
    /// `i32::MAX` for enums.
    pub fn new(scope: impl Into<String>, max: i32) -> Self {
        ReservedProcessor {
            scope: scope.into(),
            max,
            numbers: ReservedNumbers::new(),
            names: BTreeSet::new(),
            number_owners: Vec::new(),
            name_owners: Vec::new(),
        }
    }

    /// Merges every source in order.
    pub fn process<'a>(
        scope: &str,
        max: i32,
        sources: impl IntoIterator<Item = &'a ReservationSource>,
    ) -> Result<(ReservedNumbers, BTreeSet<String>), DescriptorError> {
        let mut processor = ReservedProcessor::new(scope, max);
        for source in sources {
            processor.add(source)?;
        }
        Ok(processor.finish())
    }

    pub fn add(&mut self, source: &ReservationSource) -> Result<(), DescriptorError> {
        for range in &source.ranges {
            let (from, to) = range.bounds(self.max);
            if from > to {
                return Err(DescriptorError::InvalidReservedRange {
                    scope: self.scope.clone(),
                    from,
                    to,
                    source_name: source.name.clone(),
                });
            }
            if let Some(number) = self.numbers.first_in_range(from, to) {
                return Err(DescriptorError::ReservedOverlap {
                    scope: self.scope.clone(),
                    number,
                    first: self.number_owner(number).to_string(),
                    second: source.name.clone(),
                });
            }
            self.numbers.insert_range(from, to);
            self.number_owners.push((from, to, source.name.clone()));
        }
        for name in &source.names {
            if !self.names.insert(name.clone()) {
                let first = self
                    .name_owners
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, owner)| owner.clone())
                    .unwrap_or_default();
                return Err(DescriptorError::ReservedNameOverlap {
                    scope: self.scope.clone(),
                    name: name.clone(),
                    first,
                    second: source.name.clone(),
                });
            }
            self.name_owners.push((name.clone(), source.name.clone()));
        }
        Ok(())
    }

    fn number_owner(&self, number: i32) -> &str {
        self.number_owners
            .iter()
            .find(|(from, to, _)| *from <= number && number <= *to)
            .map(|(_, _, owner)| owner.as_str())
            .unwrap_or_default()
    }

    pub fn numbers(&self) -> &ReservedNumbers {
        &self.numbers
    }

    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    pub fn finish(self) -> (ReservedNumbers, BTreeSet<String>) {
        (self.numbers, self.names)
    }

    /// The merged reservations as `reserved` statements, numbers first.
    pub fn declarations(&self) -> Vec<String> {
        render_declarations(&self.numbers, &self.names, self.max)
    }
}

pub fn render_declarations(numbers: &ReservedNumbers, names: &BTreeSet<String>, max: i32) -> Vec<String> {
    let mut out = Vec::new();
    if !numbers.is_empty() {
        out.push(format!("reserved {};", numbers.to_declaration(max)));
    }
    if !names.is_empty() {
        let names: Vec<String> = names.iter().map(|n| quote(n)).collect();
        out.push(format!("reserved {};", names.join(", ")));
    }
    out
}
