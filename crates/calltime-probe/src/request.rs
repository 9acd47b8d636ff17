use std::collections::HashSet;

/// A batch of tracked functions sharing a prefix and suffix.
///
/// `names` is comma-separated; each non-blank name becomes the identifier
/// `prefix + name.trim() + suffix`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackRequest {
    pub prefix: String,
    pub suffix: String,
    pub names: String,
}

impl TrackRequest {
    pub fn new(
        prefix: impl Into<String>,
        suffix: impl Into<String>,
        names: impl Into<String>,
    ) -> Self {
        TrackRequest {
            prefix: prefix.into(),
            suffix: suffix.into(),
            names: names.into(),
        }
    }

    /// Identifiers for this request, in the order the names were written
    pub fn identifiers(&self) -> impl Iterator<Item = String> + '_ {
        self.names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| format!("{}{}{}", self.prefix, name, self.suffix))
    }
}

/// Expand requests into identifiers, dropping exact duplicates and keeping
/// first occurrences in order.
pub fn compose_identifiers(requests: &[TrackRequest]) -> Vec<String> {
    let mut seen = HashSet::new();
    requests
        .iter()
        .flat_map(TrackRequest::identifiers)
        .filter(|ident| seen.insert(ident.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_and_suffix_expansion() {
        let request = TrackRequest::new("ProgrammableChip._", "_Operation.Execute", "ADD,MUL");
        let idents: Vec<String> = request.identifiers().collect();
        assert_eq!(
            idents,
            vec![
                "ProgrammableChip._ADD_Operation.Execute",
                "ProgrammableChip._MUL_Operation.Execute",
            ]
        );
    }

    #[test]
    fn test_blank_names_skipped_and_trimmed() {
        let request = TrackRequest::new("", "", " Bar.Execute , ,\tFoo.Run,");
        let idents: Vec<String> = request.identifiers().collect();
        assert_eq!(idents, vec!["Bar.Execute", "Foo.Run"]);
    }

    #[test]
    fn test_compose_dedups_by_exact_text() {
        let requests = vec![
            TrackRequest::new("", "", "A.x,B.y"),
            TrackRequest::new("A.", "", "x,z"),
            TrackRequest::new("", "", "a.x"),
        ];
        assert_eq!(compose_identifiers(&requests), vec!["A.x", "B.y", "A.z", "a.x"]);
    }

    #[test]
    fn test_empty_request() {
        assert!(TrackRequest::default().identifiers().next().is_none());
    }
}
