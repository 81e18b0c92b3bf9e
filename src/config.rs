use std::env;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_REPORT_BASE: &str = "http://localhost:3000";
const FALLBACK_PORTS: &[u16] = &[3000, 3002, 3005];

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub api_base: Option<String>,
    pub report_base: String,
    pub api_key: String,
    pub operator: String,
    pub reply_to: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            api_base: None,
            report_base: DEFAULT_REPORT_BASE.to_string(),
            api_key: "dev-key".to_string(),
            operator: "app".to_string(),
            reply_to: None,
        }
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|value| value.parse::<u16>().ok())
                .unwrap_or(defaults.port),
            api_base: non_empty("FAM_API_BASE"),
            report_base: non_empty("FAM_REPORT_BASE").unwrap_or(defaults.report_base),
            api_key: non_empty("FAM_API_KEY").unwrap_or(defaults.api_key),
            operator: non_empty("FAM_OPERATOR").unwrap_or(defaults.operator),
            reply_to: non_empty("FAM_REPLY_TO"),
        }
    }

    pub fn default_api_base(&self) -> String {
        match &self.api_base {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("{}/api", self.report_base.trim_end_matches('/')),
        }
    }

    pub fn api_candidates(&self) -> Vec<String> {
        if let Some(base) = &self.api_base {
            return vec![base.trim_end_matches('/').to_string()];
        }
        let mut candidates = vec![self.default_api_base()];
        for port in FALLBACK_PORTS {
            for host in ["localhost", "127.0.0.1"] {
                let candidate = format!("http://{host}:{port}/api");
                if !candidates.contains(&candidate) {
                    candidates.push(candidate);
                }
            }
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_start_with_report_origin_without_duplicates() {
        let config = AppConfig::default();
        let candidates = config.api_candidates();
        assert_eq!(candidates[0], "http://localhost:3000/api");
        assert_eq!(candidates.len(), 6);
        assert!(candidates.contains(&"http://127.0.0.1:3005/api".to_string()));
    }

    #[test]
    fn explicit_base_is_the_only_candidate() {
        let config = AppConfig {
            api_base: Some("http://backend:9000/api/".to_string()),
            ..AppConfig::default()
        };
        assert_eq!(config.api_candidates(), vec!["http://backend:9000/api".to_string()]);
        assert_eq!(config.default_api_base(), "http://backend:9000/api");
    }
}
