//! Span attribute and counter tag keys.
//!
//! Keep these stable; dashboards and alerts match on them.

/// Resource attributes
pub const SERVICE_NAME: &str = "service.name";
pub const DEPLOYMENT_ENVIRONMENT: &str = "deployment.environment";

pub const HTTP_METHOD: &str = "http.method";
pub const HTTP_URL: &str = "http.url";
pub const HTTP_ROUTE: &str = "http.route";
pub const HTTP_STATUS_CODE: &str = "http.status_code";
/// Raw body of a failed downstream response.
pub const HTTP_RESPONSE_BODY: &str = "http.response.body";
pub const PEER_SERVICE: &str = "peer.service";
pub const REQUEST_ID: &str = "request.id";

pub const ERROR_KIND: &str = "error.kind";

pub const GEO_LOCATION: &str = "geo.location";
pub const GEO_LATITUDE: &str = "geo.latitude";
pub const GEO_LONGITUDE: &str = "geo.longitude";
pub const ISS_LATITUDE: &str = "iss.latitude";
pub const ISS_LONGITUDE: &str = "iss.longitude";
pub const ISS_DEGRADED: &str = "iss.degraded";
pub const DISTANCE_KM: &str = "distance.km";
pub const FAILURE_POLICY: &str = "failure.policy";

/// Counter tags
pub const TAG_OUTCOME: &str = "outcome";
pub const TAG_RESPONSE_STATUS: &str = "response.status";
pub const TAG_SERVICE: &str = "service";
