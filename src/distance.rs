//! Distance measures between two header records over a weighted field set.

use tracing::warn;

use crate::error::ClusterError;
use crate::record::HeaderRecord;

/// Ordered header field names with non-negative weights.
///
/// Weights do not need to sum to one; measures normalize by the weights of
/// the fields actually usable for a given pair. The table is never mutated
/// by a comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldWeights {
    entries: Vec<(String, f64)>,
}

impl FieldWeights {
    /// Weight table from explicit (field, weight) pairs, insertion order
    /// preserved.
    pub fn from_weights<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(name, weight)| (name.into(), weight))
                .collect(),
        }
    }

    /// Weight table from field names, all weighted 1.0.
    pub fn from_fields<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_weights(names.into_iter().map(|name| (name, 1.0)))
    }

    /// The conventional patient-identity weight table: PatientID,
    /// PatientName and PatientBirthDate, all weighted equally.
    pub fn patient_defaults() -> Self {
        Self::from_fields(["PatientID", "PatientName", "PatientBirthDate"])
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries
            .iter()
            .map(|(name, weight)| (name.as_str(), *weight))
    }

    /// Field names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}

/// A scalar dissimilarity between two loaded header records.
///
/// Results are in `[0, 1]`: 0 for identical, 1 for maximally dissimilar.
pub trait FileDistance {
    fn distance(&self, a: &HeaderRecord, b: &HeaderRecord) -> f64;
}

/// All-or-nothing comparison across a field set.
///
/// Two records match only when every configured field stringifies equally
/// on both sides; an absent field stands in as the empty string.
#[derive(Debug, Clone)]
pub struct ExactDistance {
    weights: FieldWeights,
}

impl ExactDistance {
    pub fn new(weights: FieldWeights) -> Self {
        Self { weights }
    }

    /// True when every configured field value matches exactly.
    pub fn matches(&self, a: &HeaderRecord, b: &HeaderRecord) -> bool {
        self.weights
            .names()
            .all(|name| a.get_or(name, "") == b.get_or(name, ""))
    }
}

impl FileDistance for ExactDistance {
    fn distance(&self, a: &HeaderRecord, b: &HeaderRecord) -> f64 {
        if self.matches(a, b) { 0.0 } else { 1.0 }
    }
}

/// Weighted blend of per-field normalized edit-distance similarities.
///
/// Fields missing or empty on either side of a pair are dropped from that
/// comparison and from the normalization denominator; if nothing remains
/// usable the distance is maximal.
#[derive(Debug, Clone)]
pub struct LevenshteinDistance {
    weights: FieldWeights,
}

impl LevenshteinDistance {
    /// # Errors
    ///
    /// Fails when `weights` is empty; a weighted measure over no fields is
    /// a configuration error.
    pub fn new(weights: FieldWeights) -> Result<Self, ClusterError> {
        if weights.is_empty() {
            return Err(ClusterError::EmptyFieldWeights);
        }
        Ok(Self { weights })
    }
}

impl FileDistance for LevenshteinDistance {
    fn distance(&self, a: &HeaderRecord, b: &HeaderRecord) -> f64 {
        let mut usable = Vec::with_capacity(self.weights.len());
        for (name, weight) in self.weights.iter() {
            let (value_a, value_b) = (a.get(name), b.get(name));
            if value_a.is_none() {
                warn!(field = name, path = %a.path().display(), "field missing, dropped from comparison");
            }
            if value_b.is_none() {
                warn!(field = name, path = %b.path().display(), "field missing, dropped from comparison");
            }
            match (value_a, value_b) {
                (Some(s1), Some(s2)) if !s1.is_empty() && !s2.is_empty() => {
                    usable.push((s1, s2, weight));
                }
                _ => {}
            }
        }

        let weight_sum: f64 = usable.iter().map(|(_, _, weight)| weight).sum();
        if usable.is_empty() || weight_sum == 0.0 {
            return 1.0;
        }

        let mut distance = 0.0;
        for (s1, s2, weight) in usable {
            let similarity = if s1 == s2 {
                1.0
            } else {
                strsim::normalized_levenshtein(s1, s2)
            };
            if similarity > 0.0 {
                distance += (1.0 - similarity) * (weight / weight_sum);
            }
        }
        distance
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn record(path: &str, fields: &[(&str, &str)]) -> HeaderRecord {
        let fields: BTreeMap<String, String> = fields
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        HeaderRecord::new(path, fields)
    }

    #[test]
    fn exact_is_reflexive_and_symmetric() {
        let a = record("/a", &[("PatientID", "X1"), ("PatientName", "John")]);
        let b = record("/b", &[("PatientID", "X1"), ("PatientName", "Jane")]);
        let exact = ExactDistance::new(FieldWeights::from_fields(["PatientID", "PatientName"]));

        assert!(exact.matches(&a, &a));
        assert_eq!(exact.matches(&a, &b), exact.matches(&b, &a));
        assert_eq!(exact.distance(&a, &b), 1.0);
        assert_eq!(exact.distance(&a, &a), 0.0);
    }

    #[test]
    fn exact_treats_missing_fields_as_empty() {
        let a = record("/a", &[("PatientID", "X1")]);
        let b = record("/b", &[("PatientID", "X1"), ("PatientName", "")]);
        let exact = ExactDistance::new(FieldWeights::from_fields(["PatientID", "PatientName"]));
        assert!(exact.matches(&a, &b));
    }

    #[test]
    fn levenshtein_rejects_empty_weights() {
        let weights = FieldWeights::from_fields(Vec::<String>::new());
        assert!(matches!(
            LevenshteinDistance::new(weights),
            Err(ClusterError::EmptyFieldWeights)
        ));
    }

    #[test]
    fn levenshtein_identity_and_bounds() {
        let a = record("/a", &[("PatientName", "John"), ("PatientID", "X1")]);
        let b = record("/b", &[("PatientName", "Jon"), ("PatientID", "X2")]);
        let measure = LevenshteinDistance::new(FieldWeights::from_fields([
            "PatientName",
            "PatientID",
        ]))
        .unwrap();

        assert_eq!(measure.distance(&a, &a), 0.0);
        let d = measure.distance(&a, &b);
        assert!(d > 0.0 && d <= 1.0);
    }

    #[test]
    fn similar_names_land_strictly_between_zero_and_one() {
        let a = record("/a", &[("PatientName", "John")]);
        let b = record("/b", &[("PatientName", "Jon")]);
        let measure =
            LevenshteinDistance::new(FieldWeights::from_weights([("PatientName", 1.0)])).unwrap();

        let d = measure.distance(&a, &b);
        assert!(d > 0.0 && d < 1.0);
        assert_eq!(measure.distance(&a, &a), 0.0);
    }

    #[test]
    fn missing_fields_are_dropped_from_the_denominator() {
        // PatientID is absent on one side, so the whole distance rides on
        // PatientName alone.
        let a = record("/a", &[("PatientName", "John"), ("PatientID", "X1")]);
        let b = record("/b", &[("PatientName", "Jon")]);
        let with_both = LevenshteinDistance::new(FieldWeights::from_weights([
            ("PatientName", 1.0),
            ("PatientID", 3.0),
        ]))
        .unwrap();
        let name_only =
            LevenshteinDistance::new(FieldWeights::from_weights([("PatientName", 1.0)])).unwrap();

        assert_eq!(with_both.distance(&a, &b), name_only.distance(&a, &b));
    }

    #[test]
    fn no_usable_fields_is_maximal_distance() {
        let a = record("/a", &[("PatientName", "John")]);
        let b = record("/b", &[("PatientID", "X1")]);
        let measure =
            LevenshteinDistance::new(FieldWeights::from_fields(["PatientName", "PatientID"]))
                .unwrap();

        assert_eq!(measure.distance(&a, &b), 1.0);
    }

    #[test]
    fn zero_weights_are_maximal_distance() {
        let a = record("/a", &[("PatientName", "John")]);
        let b = record("/b", &[("PatientName", "Jon")]);
        let measure =
            LevenshteinDistance::new(FieldWeights::from_weights([("PatientName", 0.0)])).unwrap();

        assert_eq!(measure.distance(&a, &b), 1.0);
    }
}
