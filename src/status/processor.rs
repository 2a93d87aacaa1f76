use super::error::StatusResult;
use super::mapping::StatusMapping;
use super::realm::AuthRealm;
use super::resolver::DepositStatusResolver;
use crate::model::{Deposit, DepositStatus};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Resolves a deposit's status reference and maps it to a deposit status
pub struct DepositStatusProcessor {
    resolver: Arc<dyn DepositStatusResolver>,
}

impl DepositStatusProcessor {
    pub fn new(resolver: Arc<dyn DepositStatusResolver>) -> Self {
        Self { resolver }
    }

    /// `Ok(None)` means unknown: no reference yet, no state in the status
    /// document, or no mapping for the state. An invalid mapped token is an
    /// error.
    pub fn process(
        &self,
        deposit: &Deposit,
        realms: &[AuthRealm],
        mapping: &StatusMapping,
    ) -> StatusResult<Option<DepositStatus>> {
        let Some(status_ref) = deposit
            .deposit_status_ref
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
        else {
            warn!(
                "Deposit {} is missing a status reference; its status will not be processed",
                deposit.id
            );
            return Ok(None);
        };

        let realm = AuthRealm::select(realms, status_ref);
        let Some(remote) = self.resolver.resolve(status_ref, realm)? else {
            warn!("No deposit state was found in {}", status_ref);
            return Ok(None);
        };

        let status = mapping.map(&remote).inspect_err(|e| {
            error!("Unable to map remote state of deposit {}: {}", deposit.id, e);
        })?;
        match status {
            Some(status) => debug!("Deposit {}: {} -> {}", deposit.id, remote, status),
            None => warn!(
                "No status mapping for remote state {} (from {}); status is unknown",
                remote, status_ref
            ),
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Returns a fixed state and records the realm it was given
    struct FixedResolver {
        state: Option<String>,
        realm_seen: Mutex<Option<String>>,
    }

    impl FixedResolver {
        fn new(state: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                state: state.map(str::to_string),
                realm_seen: Mutex::new(None),
            })
        }
    }

    impl DepositStatusResolver for FixedResolver {
        fn resolve(&self, _: &str, realm: Option<&AuthRealm>) -> StatusResult<Option<String>> {
            *self.realm_seen.lock().unwrap() = realm.map(|r| r.username.clone());
            Ok(self.state.clone())
        }
    }

    fn deposit(status_ref: Option<&str>) -> Deposit {
        let mut deposit = Deposit::new("submission-1", "repository-1");
        deposit.deposit_status_ref = status_ref.map(str::to_string);
        deposit
    }

    fn mapping() -> StatusMapping {
        StatusMapping::new(Some("SUBMITTED")).with("urn:x", "ACCEPTED")
    }

    #[test]
    fn test_maps_resolved_state() {
        let processor = DepositStatusProcessor::new(FixedResolver::new(Some("urn:x")));
        let status = processor
            .process(&deposit(Some("https://repo/statement/1")), &[], &mapping())
            .unwrap();
        assert_eq!(status, Some(DepositStatus::Accepted));

        let processor = DepositStatusProcessor::new(FixedResolver::new(Some("urn:other")));
        let status = processor
            .process(&deposit(Some("https://repo/statement/1")), &[], &mapping())
            .unwrap();
        assert_eq!(status, Some(DepositStatus::Submitted));
    }

    #[test]
    fn test_missing_reference_is_unknown() {
        let processor = DepositStatusProcessor::new(FixedResolver::new(Some("urn:x")));
        assert_eq!(processor.process(&deposit(None), &[], &mapping()).unwrap(), None);
        assert_eq!(
            processor.process(&deposit(Some("  ")), &[], &mapping()).unwrap(),
            None
        );
    }

    #[test]
    fn test_unresolved_state_is_unknown() {
        let processor = DepositStatusProcessor::new(FixedResolver::new(None));
        let status = processor
            .process(&deposit(Some("https://repo/statement/1")), &[], &mapping())
            .unwrap();
        assert_eq!(status, None);
    }

    #[test]
    fn test_realm_selected_by_prefix() {
        let resolver = FixedResolver::new(Some("urn:x"));
        let processor = DepositStatusProcessor::new(resolver.clone());
        let realms = vec![
            AuthRealm::new("https://elsewhere/", "nobody", "x"),
            AuthRealm::new("https://repo/", "depositor", "y"),
        ];
        processor
            .process(&deposit(Some("https://repo/statement/1")), &realms, &mapping())
            .unwrap();
        assert_eq!(
            resolver.realm_seen.lock().unwrap().as_deref(),
            Some("depositor")
        );
    }

    #[test]
    fn test_invalid_mapping_is_raised() {
        let processor = DepositStatusProcessor::new(FixedResolver::new(Some("urn:x")));
        let mapping = StatusMapping::new(None).with("urn:x", "archived");
        assert!(processor
            .process(&deposit(Some("https://repo/statement/1")), &[], &mapping)
            .is_err());
    }
}
