//! API response types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use fediseer_core::{InstanceView, JudgedInstance, Mutation, ReceivedEdge, SolicitationView};
use serde::{Deserialize, Serialize};

/// Standard API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a success response.
    pub const fn ok(data: T) -> Self {
        Self { data }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Result of a mutating call.
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    /// `Changed` when something was written, `OK` otherwise.
    pub message: &'static str,
    pub mutation: Mutation,
}

impl From<Mutation> for MutationResponse {
    fn from(mutation: Mutation) -> Self {
        Self {
            message: if mutation.changed() { "Changed" } else { "OK" },
            mutation,
        }
    }
}

/// Projection requested for a listing.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListFormat {
    /// Comma-separated domains only.
    #[serde(default)]
    pub csv: bool,
    /// Array of domains only.
    #[serde(default)]
    pub domains: bool,
}

/// Listings that can be projected to bare domains.
pub trait Listed: Serialize {
    /// Domain the entry is about.
    fn listed_domain(&self) -> &str;
}

impl Listed for InstanceView {
    fn listed_domain(&self) -> &str {
        &self.domain
    }
}

impl Listed for JudgedInstance {
    fn listed_domain(&self) -> &str {
        &self.instance.domain
    }
}

impl Listed for ReceivedEdge {
    fn listed_domain(&self) -> &str {
        &self.source.domain
    }
}

impl Listed for SolicitationView {
    fn listed_domain(&self) -> &str {
        &self.source_domain
    }
}

/// A listing in the requested projection.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Listing<T: Serialize> {
    Csv { csv: String },
    Domains { domains: Vec<String> },
    Full { instances: Vec<T> },
}

impl ListFormat {
    /// Apply the projection. `csv` wins over `domains`.
    pub fn project<T: Listed>(self, items: Vec<T>) -> Listing<T> {
        if self.csv {
            let domains: Vec<&str> = items.iter().map(Listed::listed_domain).collect();
            Listing::Csv {
                csv: domains.join(","),
            }
        } else if self.domains {
            Listing::Domains {
                domains: items.iter().map(|i| i.listed_domain().to_string()).collect(),
            }
        } else {
            Listing::Full { instances: items }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Entry(&'static str);

    impl Listed for Entry {
        fn listed_domain(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn test_csv_projection() {
        let format = ListFormat {
            csv: true,
            domains: true,
        };
        let json = serde_json::to_value(format.project(vec![Entry("a.example"), Entry("b.example")]))
            .unwrap();
        assert_eq!(json["csv"], "a.example,b.example");
    }

    #[test]
    fn test_domains_projection() {
        let format = ListFormat {
            csv: false,
            domains: true,
        };
        let json = serde_json::to_value(format.project(vec![Entry("a.example")])).unwrap();
        assert_eq!(json["domains"][0], "a.example");
    }

    #[test]
    fn test_mutation_message() {
        assert_eq!(MutationResponse::from(Mutation::Created).message, "Changed");
        assert_eq!(MutationResponse::from(Mutation::Unchanged).message, "OK");
    }
}
