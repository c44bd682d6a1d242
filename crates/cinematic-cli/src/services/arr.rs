//! Radarr and Sonarr (v3 API) catalog clients

use async_trait::async_trait;
use cinematic_agent::{CatalogService, Error, Result};
use cinematic_ai::Turn;
use serde_json::{Map, Value, json};

use crate::config::ArrConfig;
use crate::services::UtilityModel;

/// Quality profile ids shared by both servers
pub const QUALITY_PROFILES: [(u64, &str); 6] = [
    (2, "SD"),
    (3, "720p"),
    (4, "1080p"),
    (5, "2160p"),
    (6, "720p/1080p"),
    (7, "Any"),
];

/// 1080p
pub const DEFAULT_QUALITY_PROFILE: u64 = 4;

const MAX_RESULTS: usize = 10;

/// Which server a client talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrKind {
    Movies,
    Series,
}

impl ArrKind {
    pub fn service_name(&self) -> &'static str {
        match self {
            ArrKind::Movies => "radarr",
            ArrKind::Series => "sonarr",
        }
    }

    fn resource(&self) -> &'static str {
        match self {
            ArrKind::Movies => "movie",
            ArrKind::Series => "series",
        }
    }

    fn external_id(&self) -> &'static str {
        match self {
            ArrKind::Movies => "tmdbId",
            ArrKind::Series => "tvdbId",
        }
    }

    fn default_root(&self) -> &'static str {
        match self {
            ArrKind::Movies => "/movies",
            ArrKind::Series => "/tv",
        }
    }
}

/// A catalog server client
pub struct ArrClient {
    kind: ArrKind,
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    auth: Option<(String, Option<String>)>,
    root_folder: String,
    model: UtilityModel,
}

impl ArrClient {
    pub fn new(kind: ArrKind, config: &ArrConfig, model: UtilityModel) -> Result<Self> {
        let base_url = config
            .url
            .as_deref()
            .ok_or_else(|| Error::service(kind.service_name(), "url is not configured"))?
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            kind,
            http: reqwest::Client::new(),
            base_url,
            api_key: config.api_key.clone().unwrap_or_default(),
            auth: config
                .auth_user
                .clone()
                .map(|user| (user, config.auth_pass.clone())),
            root_folder: config
                .root_folder
                .clone()
                .unwrap_or_else(|| kind.default_root().to_string()),
            model,
        })
    }

    fn error(&self, message: impl std::fmt::Display) -> Error {
        Error::service(self.kind.service_name(), message.to_string())
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}/api/v3/{}", self.base_url, path))
            .header("X-Api-Key", &self.api_key);
        match &self.auth {
            Some((user, pass)) => builder.basic_auth(user, pass.as_ref()),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Value> {
        let response = builder.send().await.map_err(|e| self.error(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(self.error(format!("HTTP {}", status.as_u16())));
        }
        let text = response.text().await.map_err(|e| self.error(e))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| self.error(e))
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        self.send(self.request(reqwest::Method::GET, path).query(query))
            .await
    }

    /// Fetch the server's lookup entry for an external id
    async fn lookup_external(&self, id: u64) -> Result<Value> {
        let id = id.to_string();
        let found = match self.kind {
            ArrKind::Movies => self.get("movie/lookup/tmdb", &[("tmdbId", id.as_str())]).await?,
            ArrKind::Series => {
                let term = format!("tvdb:{}", id);
                self.get("series/lookup", &[("term", term.as_str())])
                    .await?
                    .as_array()
                    .and_then(|items| items.first().cloned())
                    .unwrap_or(Value::Null)
            }
        };
        if found.is_object() {
            Ok(found)
        } else {
            Err(self.error(format!("no {} with {} {}", self.kind.resource(), self.kind.external_id(), id)))
        }
    }
}

#[async_trait]
impl CatalogService for ArrClient {
    fn name(&self) -> &str {
        self.kind.service_name()
    }

    async fn lookup(&self, term: &str, filter_hint: &str) -> Result<String> {
        let search_all = is_search_all(term);
        let items = if search_all {
            self.get(self.kind.resource(), &[]).await?
        } else {
            self.get(&format!("{}/lookup", self.kind.resource()), &[("term", term)])
                .await?
        };
        let items = items.as_array().cloned().unwrap_or_default();
        tracing::debug!(service = self.name(), term, results = items.len(), "lookup");
        if items.is_empty() {
            return Ok("No results".to_string());
        }

        let facts: Vec<String> = items
            .iter()
            .take(MAX_RESULTS)
            .map(|item| describe(self.kind, item))
            .collect();
        let hint = if search_all {
            "title;year;availability;file size".to_string()
        } else {
            with_basics(self.kind, filter_hint)
        };

        let label = match self.kind {
            ArrKind::Movies => "Movie_Name",
            ArrKind::Series => "Series_Name",
        };
        self.model
            .ask(vec![
                Turn::user(format!(
                    "You are a data parser assistant, provide a lot of information, if there are multiple matches to the query list them all, you also include data for media not available on the server. Provide a concise summary, format like this with key value {{{};unavailable;release 1995;{} 862}}",
                    label,
                    self.kind.external_id()
                )),
                Turn::user(facts.join("\n")),
                Turn::user(format!("From the above information for term {}. {}", term, hint)),
            ])
            .await
    }

    async fn add(&self, term: &str, options: &str) -> Result<()> {
        let id: u64 = term
            .trim()
            .parse()
            .map_err(|_| self.error(format!("invalid {} '{}'", self.kind.external_id(), term)))?;
        let quality = parse_quality(options).map_err(|e| self.error(e))?;

        let mut item = self.lookup_external(id).await?;
        prepare_add(self.kind, &mut item, quality, &self.root_folder);
        self.send(self.request(reqwest::Method::POST, self.kind.resource()).json(&item))
            .await?;
        tracing::info!(service = self.name(), id, quality, "item added");
        Ok(())
    }

    async fn update(&self, raw: &str) -> Result<()> {
        let fields: Map<String, Value> =
            serde_json::from_str(raw).map_err(|e| self.error(format!("invalid fields: {}", e)))?;
        let id = fields
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| self.error("update fields have no numeric id"))?;

        let path = format!("{}/{}", self.kind.resource(), id);
        let mut item = self.get(&path, &[]).await?;
        merge_fields(&mut item, fields);
        self.send(self.request(reqwest::Method::PUT, &path).json(&item))
            .await?;
        tracing::info!(service = self.name(), id, "item updated");
        Ok(())
    }
}

fn is_search_all(term: &str) -> bool {
    let term = term.trim();
    term.eq_ignore_ascii_case("all") || term.eq_ignore_ascii_case("everything")
}

/// Make sure the identifying facts are always asked for
fn with_basics(kind: ArrKind, hint: &str) -> String {
    let mut hint = hint.to_string();
    for basic in ["title", "year", "availability", kind.external_id()] {
        if !hint.contains(basic) {
            hint.push(';');
            hint.push_str(basic);
        }
    }
    hint
}

fn parse_quality(options: &str) -> std::result::Result<u64, String> {
    let options = options.trim();
    if options.is_empty() {
        return Ok(DEFAULT_QUALITY_PROFILE);
    }
    options
        .parse()
        .ok()
        .filter(|id| quality_name(*id).is_some())
        .ok_or_else(|| format!("unknown quality profile '{}'", options))
}

pub fn quality_name(id: u64) -> Option<&'static str> {
    QUALITY_PROFILES
        .iter()
        .find(|(profile, _)| *profile == id)
        .map(|(_, name)| *name)
}

fn prepare_add(kind: ArrKind, item: &mut Value, quality: u64, root_folder: &str) {
    let Some(obj) = item.as_object_mut() else {
        return;
    };
    obj.insert("qualityProfileId".into(), json!(quality));
    obj.insert("rootFolderPath".into(), json!(root_folder));
    obj.insert("monitored".into(), json!(true));
    obj.insert("minimumAvailability".into(), json!("announced"));
    match kind {
        ArrKind::Movies => {
            obj.insert("addOptions".into(), json!({ "searchForMovie": true }));
        }
        ArrKind::Series => {
            obj.insert("addOptions".into(), json!({ "searchForMissingEpisodes": true }));
            obj.insert("languageProfileId".into(), json!(1));
        }
    }
}

fn merge_fields(item: &mut Value, fields: Map<String, Value>) {
    if let Some(obj) = item.as_object_mut() {
        obj.extend(fields);
    }
}

/// Render one catalog entry as `;`-joined facts
fn describe(kind: ArrKind, item: &Value) -> String {
    let mut facts = Vec::new();
    let str_of = |key: &str| item.get(key).and_then(Value::as_str);

    facts.push(str_of("title").unwrap_or("unknown title").to_string());
    facts.push(format!(
        "status {} year {}",
        str_of("status").unwrap_or("unknown"),
        item.get("year").and_then(Value::as_u64).unwrap_or_default()
    ));
    match item.get("id").and_then(Value::as_u64) {
        Some(id) if id != 0 => {
            facts.push("available on the server".into());
            facts.push(format!("id {}", id));
        }
        _ => facts.push("unavailable on the server".into()),
    }
    if let Some(name) = item
        .get("qualityProfileId")
        .and_then(Value::as_u64)
        .and_then(quality_name)
    {
        facts.push(format!("quality wanted {}", name));
    }
    if let Some(id) = item.get(kind.external_id()).and_then(Value::as_u64) {
        facts.push(format!("{} {}", kind.external_id(), id));
    }

    match kind {
        ArrKind::Movies => describe_movie_file(item, &mut facts),
        ArrKind::Series => {
            for key in ["airTime", "network"] {
                if let Some(value) = str_of(key) {
                    facts.push(format!("{} {}", key, value));
                }
            }
        }
    }

    if let Some(runtime) = item.get("runtime").and_then(Value::as_u64) {
        facts.push(format!("runtime {} minutes", runtime));
    }
    if let Some(certification) = str_of("certification") {
        facts.push(format!("certification {}", certification));
    }
    if let Some(genres) = item.get("genres").and_then(Value::as_array) {
        let genres: Vec<&str> = genres.iter().filter_map(Value::as_str).collect();
        if !genres.is_empty() {
            facts.push(format!("genres {}", genres.join(", ")));
        }
    }
    if let Some(studio) = str_of("studio") {
        facts.push(format!("studio {}", studio));
    }

    facts.join(";")
}

fn describe_movie_file(item: &Value, facts: &mut Vec<String>) {
    if item.get("hasFile").and_then(Value::as_bool) != Some(true) {
        facts.push("no file on disk".into());
        return;
    }
    let size = item.get("sizeOnDisk").and_then(Value::as_u64).unwrap_or_default();
    facts.push(format!("file size {}", human_size(size)));

    let Some(file) = item.get("movieFile") else {
        return;
    };
    if let Some(quality) = file.pointer("/quality/quality/name").and_then(Value::as_str) {
        facts.push(format!("quality {}", quality));
    }
    if let Some(resolution) = file.pointer("/mediaInfo/resolution").and_then(Value::as_str) {
        facts.push(format!("resolution {}", resolution));
    }
    if let Some(edition) = file.get("edition").and_then(Value::as_str).filter(|e| !e.is_empty()) {
        facts.push(format!("edition {}", edition));
    }
}

/// Human readable size in binary units, e.g. 1536 -> "1.5KiB"
pub fn human_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["", "Ki", "Mi", "Gi", "Ti", "Pi"] {
        if size < 1024.0 {
            return format!("{:.1}{}B", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1}EiB", size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "512.0B");
        assert_eq!(human_size(1536), "1.5KiB");
        assert_eq!(human_size(3 * 1024 * 1024 * 1024), "3.0GiB");
    }

    #[test]
    fn test_with_basics() {
        assert_eq!(
            with_basics(ArrKind::Movies, "{title;resolution}"),
            "{title;resolution};year;availability;tmdbId"
        );
        assert_eq!(
            with_basics(ArrKind::Series, "title;year;availability;tvdbId"),
            "title;year;availability;tvdbId"
        );
    }

    #[test]
    fn test_parse_quality() {
        assert_eq!(parse_quality(""), Ok(4));
        assert_eq!(parse_quality(" 5 "), Ok(5));
        assert!(parse_quality("9").is_err());
        assert!(parse_quality("hd").is_err());
    }

    #[test]
    fn test_describe_available_movie() {
        let movie = json!({
            "title": "Alien",
            "status": "released",
            "year": 1979,
            "id": 22,
            "tmdbId": 348,
            "qualityProfileId": 5,
            "hasFile": true,
            "sizeOnDisk": 1073741824u64,
            "movieFile": {
                "quality": {"quality": {"name": "Bluray-2160p"}},
                "mediaInfo": {"resolution": "3840x1606"},
                "edition": ""
            },
            "runtime": 117,
            "genres": ["Horror", "Science Fiction"]
        });

        assert_eq!(
            describe(ArrKind::Movies, &movie),
            "Alien;status released year 1979;available on the server;id 22;quality wanted 2160p;tmdbId 348;\
             file size 1.0GiB;quality Bluray-2160p;resolution 3840x1606;runtime 117 minutes;genres Horror, Science Fiction"
        );
    }

    #[test]
    fn test_describe_missing_series() {
        let series = json!({
            "title": "Firefly",
            "status": "ended",
            "year": 2002,
            "tvdbId": 78874,
            "network": "FOX"
        });

        assert_eq!(
            describe(ArrKind::Series, &series),
            "Firefly;status ended year 2002;unavailable on the server;tvdbId 78874;network FOX"
        );
    }

    #[test]
    fn test_prepare_add_series() {
        let mut item = json!({"title": "Firefly", "tvdbId": 78874});
        prepare_add(ArrKind::Series, &mut item, 3, "/tv");
        assert_eq!(item["qualityProfileId"], 3);
        assert_eq!(item["rootFolderPath"], "/tv");
        assert_eq!(item["monitored"], true);
        assert_eq!(item["languageProfileId"], 1);
        assert_eq!(item["addOptions"]["searchForMissingEpisodes"], true);
    }

    #[test]
    fn test_merge_fields_overrides() {
        let mut item = json!({"id": 5, "title": "Thunder", "qualityProfileId": 4});
        let fields: Map<String, Value> =
            serde_json::from_str(r#"{"id":5,"qualityProfileId":5}"#).unwrap();
        merge_fields(&mut item, fields);
        assert_eq!(item["qualityProfileId"], 5);
        assert_eq!(item["title"], "Thunder");
    }

    #[test]
    fn test_search_all_terms() {
        assert!(is_search_all("All"));
        assert!(is_search_all(" everything "));
        assert!(!is_search_all("alien"));
    }
}
