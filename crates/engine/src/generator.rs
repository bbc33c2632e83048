//! Synthetic collection generator
//!
//! Produces a deterministic collection from a seed: creation options, one
//! secondary index (two with the compound index switched on) and a stream of
//! documents mixing every JSON type the
//! database stores (integers, doubles, strings, booleans, nulls, nested
//! objects and arrays).

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

use strata_fidelity_core::{CollectionOptions, DataGenerator, Document, IndexSpec, ORDERING_KEY};

/// Size of a generated capped collection: 1 MiB
pub const CAPPED_SIZE: u64 = 1024 * 1024;

/// Name of the generated single-field index on `a`
pub const SINGLE_FIELD_INDEX: &str = "a_1";

/// Name of the generated compound index on `b` and `c.d`
pub const COMPOUND_INDEX: &str = "b_c_compound";

/// What to generate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Create a capped collection of [`CAPPED_SIZE`] bytes
    pub capped: bool,
    /// Number of documents
    pub documents: usize,
    /// RNG seed; equal seeds give equal collections
    pub seed: u64,
    /// Also build [`COMPOUND_INDEX`] after [`SINGLE_FIELD_INDEX`]
    pub compound_index: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            capped: false,
            documents: 20,
            seed: 0x5EED,
            compound_index: false,
        }
    }
}

/// Seeded generator of one synthetic collection
#[derive(Debug, Clone)]
pub struct CollectionDataGenerator {
    options: GeneratorOptions,
}

impl CollectionDataGenerator {
    /// Generator for `options`
    pub fn new(options: GeneratorOptions) -> Self {
        Self { options }
    }

    /// Options in use
    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    fn index_specs(&self) -> Vec<IndexSpec> {
        let mut single = Document::new();
        single.insert("a".to_string(), json!(1));
        let mut specs = vec![IndexSpec::new(single)];

        if self.options.compound_index {
            let mut compound = Document::new();
            compound.insert("b".to_string(), json!(1));
            compound.insert("c.d".to_string(), json!(-1));
            specs.push(IndexSpec::new(compound).named(COMPOUND_INDEX));
        }
        specs
    }
}

impl DataGenerator for CollectionDataGenerator {
    type Indexes = std::vec::IntoIter<IndexSpec>;
    type Data = GeneratedDocuments;

    fn collection_metadata(&self) -> CollectionOptions {
        if self.options.capped {
            CollectionOptions::capped(CAPPED_SIZE)
        } else {
            CollectionOptions::default()
        }
    }

    fn into_streams(self) -> (Self::Indexes, Self::Data) {
        let documents = GeneratedDocuments {
            rng: StdRng::seed_from_u64(self.options.seed),
            next: 0,
            total: self.options.documents,
        };
        (self.index_specs().into_iter(), documents)
    }
}

/// One-shot stream of generated documents
#[derive(Debug)]
pub struct GeneratedDocuments {
    rng: StdRng,
    next: usize,
    total: usize,
}

impl GeneratedDocuments {
    fn word(&mut self, max_len: usize) -> String {
        let len = self.rng.gen_range(1..=max_len);
        (&mut self.rng)
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }

    fn document(&mut self, ordinal: usize) -> Document {
        let a: i64 = self.rng.gen_range(0..1000);
        let b = self.word(12);
        // Two decimal places keep doubles exact enough to read back unchanged
        let d = f64::from(self.rng.gen_range(0..100_000_i32)) / 100.0;
        let e = self.rng.gen_bool(0.5);
        let tags: Vec<Value> = (0..self.rng.gen_range(0..4))
            .map(|_| Value::from(self.rng.gen_range(-50..50_i64)))
            .collect();
        let h = self.rng.gen::<f64>();

        let mut document = Document::new();
        document.insert(ORDERING_KEY.to_string(), Value::from(format!("gen-{}", ordinal)));
        document.insert("a".to_string(), Value::from(a));
        document.insert("b".to_string(), Value::from(b));
        document.insert("c".to_string(), json!({ "d": d, "e": e }));
        document.insert("f".to_string(), Value::Array(tags));
        if ordinal % 5 == 0 {
            document.insert("g".to_string(), Value::Null);
        }
        document.insert("h".to_string(), Value::from(h));
        document
    }
}

impl Iterator for GeneratedDocuments {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        if self.next >= self.total {
            return None;
        }
        let ordinal = self.next;
        self.next += 1;
        Some(self.document(ordinal))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for GeneratedDocuments {}
