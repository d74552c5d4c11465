//! OpenAPI specification for the primes API.

use utoipa::OpenApi;

use super::error::ApiErrorBody;
use super::handlers;
use super::types::{HealthResponse, PrimeList, PrimesResponse};
use crate::worker::Isolation;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "primes API",
        description = "Computes all primes up to N in an isolated compute unit per request.",
        version = "1.0.0",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        handlers::get_primes,
        handlers::health_check,
    ),
    components(schemas(
        PrimesResponse,
        PrimeList,
        ApiErrorBody,
        HealthResponse,
        Isolation,
    )),
    tags(
        (name = "primes", description = "Prime number generation"),
        (name = "health", description = "Health checks")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_endpoints() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/primes/{n}"));
        assert!(doc.paths.paths.contains_key("/api/health"));
    }
}
