//! Ordered, editable lists of ingredients and instructions.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An ordered list of text entries, used for both ingredients and
/// instructions.
///
/// Indices are zero-based. Editing keeps blank entries (a form row that has
/// not been filled in yet); [`StepList::normalized`] trims entries and drops
/// the blank ones before a recipe is saved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepList(Vec<String>);

impl StepList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Number of entries, blank ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entry at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// Iterate over the entries in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// The entries as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Consume the list, returning the entries.
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }

    /// Append an entry.
    pub fn push(&mut self, text: impl Into<String>) {
        self.0.push(text.into());
    }

    /// Insert an entry before `index`. `index == len()` appends.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `index > len()`.
    pub fn insert(&mut self, index: usize, text: impl Into<String>) -> Result<()> {
        if index > self.0.len() {
            return Err(self.out_of_range(index));
        }
        self.0.insert(index, text.into());
        Ok(())
    }

    /// Remove and return the entry at `index`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `index` is out of range.
    pub fn remove(&mut self, index: usize) -> Result<String> {
        self.check(index)?;
        Ok(self.0.remove(index))
    }

    /// Replace the entry at `index`, returning the previous text.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `index` is out of range.
    pub fn replace(&mut self, index: usize, text: impl Into<String>) -> Result<String> {
        self.check(index)?;
        Ok(std::mem::replace(&mut self.0[index], text.into()))
    }

    /// Swap the entry at `index` with the one before it.
    ///
    /// Moving the first entry up is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `index` is out of range.
    pub fn move_up(&mut self, index: usize) -> Result<()> {
        self.check(index)?;
        if index > 0 {
            self.0.swap(index - 1, index);
        }
        Ok(())
    }

    /// Swap the entry at `index` with the one after it.
    ///
    /// Moving the last entry down is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `index` is out of range.
    pub fn move_down(&mut self, index: usize) -> Result<()> {
        self.check(index)?;
        if index + 1 < self.0.len() {
            self.0.swap(index, index + 1);
        }
        Ok(())
    }

    /// Trim every entry and drop the blank ones, preserving order.
    #[must_use]
    pub fn normalized(&self) -> Self {
        self.0
            .iter()
            .map(|entry| entry.trim())
            .filter(|entry| !entry.is_empty())
            .map(String::from)
            .collect()
    }

    fn check(&self, index: usize) -> Result<()> {
        if index < self.0.len() {
            Ok(())
        } else {
            Err(self.out_of_range(index))
        }
    }

    fn out_of_range(&self, index: usize) -> Error {
        Error::validation(
            "position",
            format!(
                "{} is out of range (list has {} entries)",
                index + 1,
                self.0.len()
            ),
        )
    }
}

impl<S: Into<String>> FromIterator<S> for StepList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<String>> for StepList {
    fn from(entries: Vec<String>) -> Self {
        Self(entries)
    }
}
