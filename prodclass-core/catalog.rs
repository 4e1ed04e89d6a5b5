use crate::feature::FeatureSet;

/// One reference product: its identifier and precomputed features
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    identifier: String,
    features: FeatureSet,
}

impl CatalogEntry {
    pub fn new(identifier: impl Into<String>, features: FeatureSet) -> Self {
        Self {
            identifier: identifier.into(),
            features,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }
}

/// Read-only collection of reference entries.
///
/// A catalog is assembled once and never mutated afterwards, so scans may
/// read it from any number of threads at the same time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&CatalogEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CatalogEntry> {
        self.entries.iter()
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.identifier())
    }
}

impl FromIterator<CatalogEntry> for Catalog {
    fn from_iter<I: IntoIterator<Item = CatalogEntry>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a CatalogEntry;
    type IntoIter = std::slice::Iter<'a, CatalogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
