//! Province / department / locality directory used to populate field dropdowns.
//!
//! The data is advisory. Lookup failures degrade to empty lists and are only
//! logged; nothing downstream depends on the directory being complete.

use crate::error::Result;
use log::{debug, warn};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Source of region names, one request per call.
pub trait RegionSource {
    fn provinces(&self) -> Result<Vec<String>>;
    fn departments(&self, province: &str) -> Result<Vec<String>>;
    fn localities(&self, province: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionDirectory {
    pub provinces: Vec<String>,
    pub departments: BTreeMap<String, Vec<String>>,
    pub localities: BTreeMap<String, Vec<String>>,
}

impl RegionDirectory {
    pub fn is_empty(&self) -> bool {
        self.provinces.is_empty()
    }

    pub fn departments_of(&self, province: &str) -> &[String] {
        self.departments.get(province).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn localities_of(&self, province: &str) -> &[String] {
        self.localities.get(province).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn sorted_or_empty(result: Result<Vec<String>>, what: &str, province: &str) -> Vec<String> {
    match result {
        Ok(mut names) => {
            names.sort();
            names
        }
        Err(e) => {
            warn!("No {} for '{}': {}", what, province, e);
            Vec::new()
        }
    }
}

/// Fetches the full directory. Only a failed province listing is an error;
/// a failed per-province lookup leaves that province with an empty list.
pub fn fetch_directory<S: RegionSource + ?Sized>(source: &S) -> Result<RegionDirectory> {
    let mut provinces = source.provinces()?;
    provinces.sort();

    let mut directory = RegionDirectory::default();
    for province in &provinces {
        let departments = sorted_or_empty(source.departments(province), "departments", province);
        let localities = sorted_or_empty(source.localities(province), "localities", province);
        directory.departments.insert(province.clone(), departments);
        directory.localities.insert(province.clone(), localities);
    }
    directory.provinces = provinces;

    debug!("Fetched {} province(s)", directory.provinces.len());
    Ok(directory)
}

/// Memoizes a [`RegionDirectory`] for a fixed time-to-live.
pub struct RegionCache<S> {
    source: S,
    ttl: Duration,
    cached: Option<(Instant, RegionDirectory)>,
}

impl<S: RegionSource> RegionCache<S> {
    pub fn new(source: S, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cached: None,
        }
    }

    fn is_fresh(&self) -> bool {
        matches!(&self.cached, Some((at, _)) if at.elapsed() < self.ttl)
    }

    /// The cached directory, refreshed when older than the TTL. If a refresh
    /// fails the previous directory is served, or an empty one if there is none;
    /// the next call tries again.
    pub fn get_regions(&mut self) -> Cow<'_, RegionDirectory> {
        if !self.is_fresh() {
            match fetch_directory(&self.source) {
                Ok(directory) => self.cached = Some((Instant::now(), directory)),
                Err(e) => warn!("Region lookup failed: {}", e),
            }
        }

        match &self.cached {
            Some((_, directory)) => Cow::Borrowed(directory),
            None => Cow::Owned(RegionDirectory::default()),
        }
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}

#[cfg(feature = "georef")]
mod georef {
    use super::RegionSource;
    use crate::config::GeorefConfig;
    use crate::error::{IntakeError, Result};
    use reqwest::blocking::Client;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Named {
        nombre: String,
    }

    #[derive(Deserialize)]
    struct ProvincesResponse {
        #[serde(default)]
        provincias: Vec<Named>,
    }

    #[derive(Deserialize)]
    struct DepartmentsResponse {
        #[serde(default)]
        departamentos: Vec<Named>,
    }

    #[derive(Deserialize)]
    struct LocalitiesResponse {
        #[serde(default)]
        localidades: Vec<Named>,
    }

    /// Client for the Argentine georef API.
    pub struct GeorefClient {
        client: Client,
        config: GeorefConfig,
    }

    impl GeorefClient {
        pub fn new(config: GeorefConfig) -> Result<Self> {
            let client = Client::builder().timeout(config.timeout()).build()?;
            Ok(Self { client, config })
        }

        fn get<T: for<'de> Deserialize<'de>>(
            &self,
            endpoint: &str,
            query: &[(&str, String)],
        ) -> Result<T> {
            let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint);
            let response = self.client.get(&url).query(query).send()?;
            let status = response.status();
            if !status.is_success() {
                return Err(IntakeError::Lookup(format!("{} returned {}", url, status)));
            }
            Ok(response.json()?)
        }
    }

    impl RegionSource for GeorefClient {
        fn provinces(&self) -> Result<Vec<String>> {
            let body: ProvincesResponse = self.get("provincias", &[])?;
            Ok(body.provincias.into_iter().map(|p| p.nombre).collect())
        }

        fn departments(&self, province: &str) -> Result<Vec<String>> {
            let body: DepartmentsResponse = self.get(
                "departamentos",
                &[
                    ("provincia", province.to_string()),
                    ("max", self.config.max_departments.to_string()),
                ],
            )?;
            Ok(body.departamentos.into_iter().map(|d| d.nombre).collect())
        }

        fn localities(&self, province: &str) -> Result<Vec<String>> {
            let body: LocalitiesResponse = self.get(
                "localidades",
                &[
                    ("provincia", province.to_string()),
                    ("max", self.config.max_localities.to_string()),
                ],
            )?;
            Ok(body.localidades.into_iter().map(|l| l.nombre).collect())
        }
    }
}

#[cfg(feature = "georef")]
pub use georef::GeorefClient;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IntakeError;
    use std::cell::Cell;

    struct FakeSource {
        calls: Cell<usize>,
        fail_provinces: Cell<bool>,
    }

    impl FakeSource {
        fn new() -> Self {
            Self {
                calls: Cell::new(0),
                fail_provinces: Cell::new(false),
            }
        }
    }

    impl RegionSource for FakeSource {
        fn provinces(&self) -> Result<Vec<String>> {
            self.calls.set(self.calls.get() + 1);
            if self.fail_provinces.get() {
                return Err(IntakeError::Lookup("offline".to_string()));
            }
            Ok(vec!["Santa Fe".to_string(), "Buenos Aires".to_string()])
        }

        fn departments(&self, province: &str) -> Result<Vec<String>> {
            match province {
                "Buenos Aires" => Ok(vec!["Pergamino".to_string(), "Junín".to_string()]),
                _ => Err(IntakeError::Lookup("500".to_string())),
            }
        }

        fn localities(&self, _province: &str) -> Result<Vec<String>> {
            Ok(vec!["Centro".to_string()])
        }
    }

    #[test]
    fn test_per_province_failure_is_empty() {
        let directory = fetch_directory(&FakeSource::new()).unwrap();
        assert_eq!(directory.provinces, vec!["Buenos Aires", "Santa Fe"]);
        assert_eq!(directory.departments_of("Buenos Aires"), &["Junín", "Pergamino"]);
        assert!(directory.departments_of("Santa Fe").is_empty());
        assert_eq!(directory.localities_of("Santa Fe"), &["Centro"]);
        assert!(directory.departments_of("Chubut").is_empty());
    }

    #[test]
    fn test_cache_memoizes_within_ttl() {
        let mut cache = RegionCache::new(FakeSource::new(), Duration::from_secs(3600));
        assert_eq!(cache.get_regions().provinces.len(), 2);
        assert_eq!(cache.get_regions().provinces.len(), 2);
        assert_eq!(cache.source.calls.get(), 1);

        cache.invalidate();
        cache.get_regions();
        assert_eq!(cache.source.calls.get(), 2);
    }

    #[test]
    fn test_failed_listing_is_not_memoized() {
        let source = FakeSource::new();
        source.fail_provinces.set(true);
        let mut cache = RegionCache::new(source, Duration::from_secs(3600));

        assert!(cache.get_regions().is_empty());
        cache.source.fail_provinces.set(false);
        assert_eq!(cache.get_regions().provinces.len(), 2);
        assert_eq!(cache.source.calls.get(), 2);
    }

    #[test]
    fn test_expired_cache_serves_previous_on_failure() {
        let mut cache = RegionCache::new(FakeSource::new(), Duration::ZERO);
        assert_eq!(cache.get_regions().provinces.len(), 2);

        cache.source.fail_provinces.set(true);
        assert_eq!(cache.get_regions().provinces.len(), 2);
        assert_eq!(cache.source.calls.get(), 2);
    }
}
