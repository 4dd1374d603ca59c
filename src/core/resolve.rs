// StockScan - core/resolve.rs
//
// Client resolution contract. The two directory services (vehicle lookup by
// chassis, client lookup by id) are external collaborators; this module
// defines the trait the rest of the crate programs against and the
// composition of the two calls. The HTTP adapter lives in the app layer.

use crate::util::error::ResolveError;

// =============================================================================
// Collaborator data shapes
// =============================================================================

/// Vehicle lookup result: the client attached to a chassis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleClient {
    pub client_id: String,
}

/// Client lookup result: identity details for a client id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientDetails {
    pub nom: String,
    pub prenom: String,
    pub wilaya: String,
}

impl ClientDetails {
    /// Display name as stored on movement records.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.nom, self.prenom).trim().to_string()
    }
}

/// A fully resolved client, ready to be stamped onto a movement record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedClient {
    pub client_id: String,
    pub client_name: String,
    pub wilaya: String,
}

/// Manual search criteria. Empty fields are not sent as filters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientQuery {
    pub id: String,
    pub nom: String,
    pub prenom: String,
}

/// One row of a manual search result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientSummary {
    pub id: String,
    pub nom: String,
    pub prenom: String,
    pub mobile: String,
    pub email: String,
}

/// One page of manual search results.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientPage {
    pub clients: Vec<ClientSummary>,
    pub page: usize,
    pub total: usize,
}

// =============================================================================
// Collaborator contract
// =============================================================================

/// The external client directory, as the workflow sees it.
///
/// Implementations must map "chassis has no attached client" to
/// `ResolveError::NotReserved` — the workflow shows that state its own
/// message and must be able to tell it from a network fault.
pub trait ClientDirectory: Send + Sync {
    /// Look up the client attached to a chassis number.
    fn vehicle_client(&self, chassis: &str) -> Result<VehicleClient, ResolveError>;

    /// Look up identity details for a client id.
    fn client_details(&self, client_id: &str) -> Result<ClientDetails, ResolveError>;

    /// Paged manual search (the operator's override path).
    fn search_clients(&self, query: &ClientQuery, page: usize)
        -> Result<ClientPage, ResolveError>;
}

/// Resolve a chassis number to a full client: vehicle lookup, then client
/// details. Any failure propagates unchanged so the `NotReserved` /
/// generic-failure split reaches the caller intact.
pub fn resolve_chassis(
    directory: &dyn ClientDirectory,
    chassis: &str,
) -> Result<ResolvedClient, ResolveError> {
    let vehicle = directory.vehicle_client(chassis)?;
    let details = directory.client_details(&vehicle.client_id)?;

    tracing::debug!(
        chassis = %chassis,
        client_id = %vehicle.client_id,
        "Chassis resolved"
    );

    Ok(ResolvedClient {
        client_id: vehicle.client_id,
        client_name: details.full_name(),
        wilaya: details.wilaya,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Canned directory: one reserved chassis, everything else not reserved.
    struct FakeDirectory;

    impl ClientDirectory for FakeDirectory {
        fn vehicle_client(&self, chassis: &str) -> Result<VehicleClient, ResolveError> {
            if chassis == "CH-RESERVED" {
                Ok(VehicleClient {
                    client_id: "42".to_string(),
                })
            } else {
                Err(ResolveError::NotReserved {
                    chassis: chassis.to_string(),
                })
            }
        }

        fn client_details(&self, client_id: &str) -> Result<ClientDetails, ResolveError> {
            assert_eq!(client_id, "42");
            Ok(ClientDetails {
                nom: "BENALI".to_string(),
                prenom: "Karim".to_string(),
                wilaya: "Béjaïa".to_string(),
            })
        }

        fn search_clients(
            &self,
            _query: &ClientQuery,
            _page: usize,
        ) -> Result<ClientPage, ResolveError> {
            Ok(ClientPage::default())
        }
    }

    #[test]
    fn test_resolve_chassis_composes_both_lookups() {
        let resolved = resolve_chassis(&FakeDirectory, "CH-RESERVED").unwrap();
        assert_eq!(resolved.client_id, "42");
        assert_eq!(resolved.client_name, "BENALI Karim");
        assert_eq!(resolved.wilaya, "Béjaïa");
    }

    #[test]
    fn test_resolve_chassis_propagates_not_reserved() {
        let err = resolve_chassis(&FakeDirectory, "CH-FREE").unwrap_err();
        assert!(err.is_not_reserved());
        match err {
            ResolveError::NotReserved { chassis } => assert_eq!(chassis, "CH-FREE"),
            other => panic!("expected NotReserved, got {other:?}"),
        }
    }

    #[test]
    fn test_full_name_trims_missing_parts() {
        let details = ClientDetails {
            nom: "BENALI".to_string(),
            prenom: String::new(),
            wilaya: String::new(),
        };
        assert_eq!(details.full_name(), "BENALI");
    }
}
