//! Deployment parameters.
//!
//! The signer, the server, and anybody checking their setup must agree on
//! the table size, the number of selected entries, and the index encoding.
//! If they don't, selection silently diverges and every verification fails,
//! so parameters are validated once, before any table is built or served.
use serde::{Deserialize, Serialize};

use crate::constants::MAX_HASH_LEN;
use crate::protocol::InitializationError;

/// How a selection digest is cut into table indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectionEncoding {
    /// Two digest bytes per index: `d[2k] + (d[2k + 1] / 64) * 256`, in `[0, 1024)`.
    Wide,
    /// One digest byte per index: `d[k] / 2`, in `[0, 128)`.
    Narrow,
}

impl SelectionEncoding {
    /// The number of distinct indices this encoding can produce.
    pub const fn index_range(self) -> usize {
        match self {
            Self::Wide => 1024,
            Self::Narrow => 128,
        }
    }

    /// The number of digest bytes needed to produce `count` indices.
    pub const fn digest_len(self, count: usize) -> usize {
        match self {
            Self::Wide => 2 * count,
            Self::Narrow => count,
        }
    }

    /// Read the `k`th index out of a digest.
    ///
    /// The digest must hold at least `digest_len(k + 1)` bytes.
    pub(crate) fn index(self, digest: &[u8], k: usize) -> usize {
        match self {
            Self::Wide => usize::from(digest[2 * k]) + usize::from(digest[2 * k + 1] / 64) * 256,
            Self::Narrow => usize::from(digest[k] / 2),
        }
    }
}

/// The geometry of the precomputed tables, and how they're indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameters {
    table_size: usize,
    selection_count: usize,
    encoding: SelectionEncoding,
}

impl Parameters {
    /// 128 entries per group, 40 selected per group, narrow indices.
    ///
    /// Signing only indexes into the secret tables.
    pub const HIGH_SPEED: Self = Self {
        table_size: 128,
        selection_count: 40,
        encoding: SelectionEncoding::Narrow,
    };

    /// 1024 entries per group, 18 selected per group, wide indices.
    ///
    /// Meant for signing by recomputing the selected scalars.
    pub const LOW_STORAGE: Self = Self {
        table_size: 1024,
        selection_count: 18,
        encoding: SelectionEncoding::Wide,
    };

    /// Create new parameters, checking that they are usable.
    pub fn new(
        table_size: usize,
        selection_count: usize,
        encoding: SelectionEncoding,
    ) -> Result<Self, InitializationError> {
        let params = Self {
            table_size,
            selection_count,
            encoding,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check that these parameters are usable.
    ///
    /// This matters for parameters which were deserialized, rather than created with [Parameters::new].
    pub fn validate(&self) -> Result<(), InitializationError> {
        if self.table_size == 0 {
            return Err(InitializationError::BadParameters(
                "table size cannot be 0".to_string(),
            ));
        }
        if self.selection_count == 0 {
            return Err(InitializationError::BadParameters(
                "selection count cannot be 0".to_string(),
            ));
        }
        if self.table_size > self.encoding.index_range() {
            return Err(InitializationError::BadParameters(format!(
                "table size {} exceeds the {} indices of {:?} encoding",
                self.table_size,
                self.encoding.index_range(),
                self.encoding
            )));
        }
        if self.digest_len() > MAX_HASH_LEN {
            return Err(InitializationError::BadParameters(format!(
                "selecting {} entries with {:?} encoding needs a {} byte digest, at most {} allowed",
                self.selection_count,
                self.encoding,
                self.digest_len(),
                MAX_HASH_LEN
            )));
        }
        Ok(())
    }

    /// Check that another party is using the same parameters.
    pub fn ensure_matches(&self, other: &Self) -> Result<(), InitializationError> {
        if self != other {
            return Err(InitializationError::BadParameters(format!(
                "mismatched parameters: {self:?} != {other:?}"
            )));
        }
        Ok(())
    }

    /// The number of entries in each group's table, `N`.
    pub fn table_size(&self) -> usize {
        self.table_size
    }

    /// The number of entries selected from each group, `V`.
    pub fn selection_count(&self) -> usize {
        self.selection_count
    }

    pub fn encoding(&self) -> SelectionEncoding {
        self.encoding
    }

    pub(crate) fn digest_len(&self) -> usize {
        self.encoding.digest_len(self.selection_count)
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self::HIGH_SPEED
    }
}
