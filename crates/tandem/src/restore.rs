//! Hooks for an external state-restoration driver.
//!
//! The driver itself lives outside this crate. It brackets a restoration with
//! a [`RestoreGuard`], defers container notifications, and retries
//! [`StateError::NotYetCreatable`] failures pass by pass under a
//! [`RetryBudget`].

use crate::catalog::Catalog;
use crate::error::StateError;

/// Marks the catalog as setting state until dropped. Guards nest.
#[derive(Debug)]
#[must_use = "the catalog stops setting state when the guard is dropped"]
pub struct RestoreGuard {
	catalog: Catalog,
}

impl RestoreGuard {
	pub fn begin(catalog: &Catalog) -> Self {
		catalog.enter_restore();
		tracing::debug!("state restoration started");
		Self {
			catalog: catalog.clone(),
		}
	}
}

impl Drop for RestoreGuard {
	fn drop(&mut self) {
		self.catalog.exit_restore();
		if !self.catalog.is_setting_state() {
			tracing::debug!("state restoration finished");
		}
	}
}

/// Counts restoration passes against a limit.
#[derive(Debug, Clone)]
pub struct RetryBudget {
	limit: usize,
	passes: usize,
}

impl RetryBudget {
	pub fn new(limit: usize) -> Self {
		Self { limit, passes: 0 }
	}

	/// Uses the catalog's configured `restore_retry_limit`.
	pub fn from_catalog(catalog: &Catalog) -> Self {
		Self::new(catalog.config().restore_retry_limit)
	}

	pub fn limit(&self) -> usize {
		self.limit
	}

	pub fn passes(&self) -> usize {
		self.passes
	}

	/// Starts another pass, returning its 1-based number.
	///
	/// Fails with [`StateError::RetryBudgetExceeded`] once `limit` passes have
	/// been used.
	pub fn next_pass(&mut self) -> Result<usize, StateError> {
		if self.passes >= self.limit {
			tracing::warn!(limit = self.limit, "state restoration retry budget exhausted");
			return Err(StateError::RetryBudgetExceeded { limit: self.limit });
		}
		self.passes += 1;
		Ok(self.passes)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::CatalogConfig;

	#[test]
	fn test_guard_nests() {
		let catalog = Catalog::default();
		assert!(!catalog.is_setting_state());
		{
			let _outer = RestoreGuard::begin(&catalog);
			{
				let _inner = RestoreGuard::begin(&catalog);
				assert!(catalog.is_setting_state());
			}
			assert!(catalog.is_setting_state());
		}
		assert!(!catalog.is_setting_state());
	}

	#[test]
	fn test_budget_exhausts_after_limit() {
		let catalog = Catalog::new(CatalogConfig::default().with_restore_retry_limit(2));
		let mut budget = RetryBudget::from_catalog(&catalog);
		assert_eq!(budget.next_pass(), Ok(1));
		assert_eq!(budget.next_pass(), Ok(2));
		assert_eq!(
			budget.next_pass(),
			Err(StateError::RetryBudgetExceeded { limit: 2 })
		);
		assert_eq!(budget.passes(), 2);
	}

	#[test]
	fn test_default_budget_is_two_hundred() {
		assert_eq!(RetryBudget::from_catalog(&Catalog::default()).limit(), 200);
	}
}
