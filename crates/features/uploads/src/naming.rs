use crate::error::UploadsError;
use stash_domain::constants::MAX_NAME_LENGTH;
use stash_kernel::{NAME_ALPHABET, random_name};
use stash_storage::NamespacedStorage;
use tracing::debug;

/// Consecutive exact-name collisions tolerated at one length before widening.
pub const DEFAULT_MAX_COLLISIONS: usize = 64;

/// Allocates random file names that are unused within a namespace and extension.
///
/// Names are drawn from the 62-symbol alphabet. The length grows by one when the files
/// already stored for an extension fill the whole space of the current length, or when
/// draws keep colliding in a nearly full one.
#[derive(Debug, Clone, Copy)]
pub struct NameGenerator {
    max_collisions: usize,
    max_length: usize,
}

impl Default for NameGenerator {
    fn default() -> Self {
        Self { max_collisions: DEFAULT_MAX_COLLISIONS, max_length: MAX_NAME_LENGTH }
    }
}

impl NameGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn max_collisions(mut self, max_collisions: usize) -> Self {
        self.max_collisions = max_collisions;
        self
    }

    /// Returns a name (without extension) not currently taken by `<name><extension>`.
    ///
    /// The returned name is only a candidate: the caller publishes with an exclusive
    /// create and comes back here when it loses a race.
    ///
    /// # Errors
    /// Returns [`UploadsError::Internal`] when the length ceiling is exceeded, and [`UploadsError::Storage`] when the directory cannot be inspected.
    pub async fn generate(
        &self,
        store: &NamespacedStorage,
        extension: &str,
        desired_length: usize,
    ) -> Result<String, UploadsError> {
        let mut length = desired_length.max(1);
        let mut collisions = 0;

        loop {
            if length > self.max_length {
                return Err(UploadsError::Internal {
                    message: format!("Name space exhausted in namespace \"{}\"", store.name()).into(),
                    context: Some(format!("length ceiling {} exceeded", self.max_length).into()),
                });
            }

            let used = store.count_matching(extension).await?;
            if is_saturated(used, length) {
                debug!(namespace = store.name(), extension, used, length, "Widening generated names");
                length += 1;
                continue;
            }

            let name = random_name!(length);
            if !store.exists(&format!("{name}{extension}")).await? {
                return Ok(name);
            }

            collisions += 1;
            if collisions >= self.max_collisions {
                debug!(namespace = store.name(), extension, collisions, length, "Widening after collisions");
                collisions = 0;
                length += 1;
            }
        }
    }
}

/// True iff `used` names fill every combination of `length` symbols.
pub(crate) fn is_saturated(used: usize, length: usize) -> bool {
    let Ok(exponent) = u32::try_from(length) else {
        return false;
    };

    // Past u128 the space cannot be full.
    (NAME_ALPHABET.len() as u128).checked_pow(exponent).is_some_and(|capacity| used as u128 >= capacity)
}
