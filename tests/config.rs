// ABOUTME: Integration tests for configuration parsing and validation.
// ABOUTME: Tests YAML parsing, defaults, validation errors and discovery order.

use slotswap::config::*;
use slotswap::error::Error;
use slotswap::types::Slot;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const MINIMAL: &str = r#"
domain: api.example.com
slots:
  blue:
    service: backend-blue
    container: app-backend-blue
    upstream: backend-blue:8000
  green:
    service: backend-green
    container: app-backend-green
    upstream: backend-green:8000
"#;

mod parsing {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.domain, "api.example.com");
        assert_eq!(config.slot(Slot::Green).upstream, "backend-green:8000");
        assert_eq!(config.default_slot, Slot::Blue);
        assert!(config.auto_rollback);
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.health.path, "/health");
        assert_eq!(config.health.timeout, Duration::from_secs(240));
        assert_eq!(config.probe.path, "/__slot");
        assert_eq!(config.probe.header, "X-Deploy-Slot");
        assert_eq!(config.probe.retries, 10);
        assert_eq!(config.probe.effective_port(), 443);
        assert_eq!(config.edge.public_port, 443);
        assert_eq!(config.edge.unit, "caddy");
        assert_eq!(
            config.edge.container_config_path,
            PathBuf::from("/etc/caddy/Caddyfile")
        );
        assert_eq!(
            config.marker_path(),
            PathBuf::from("/var/lib/slotswap/active_color")
        );
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
domain: shop.example.org
public_ip: 203.0.113.7
slots:
  blue:
    service: web-blue
    container: shop-web-blue
    upstream: 127.0.0.1:9001
    local_port: 9001
  green:
    service: web-green
    container: shop-web-green
    upstream: 127.0.0.1:9002
    local_port: 9002
health:
  path: /ready
  timeout: 90s
  interval: 2s
probe:
  path: /__color
  header: X-Color
  retries: 4
  interval: 500ms
edge:
  unit: caddy-edge
  keep_backups: 3
  extra_directives:
    - encode gzip
    - "log {\n\toutput stdout\n}"
bring_up:
  command: [podman-compose, up, -d, "{service}"]
  timeout: 2m
state_dir: /srv/slotswap
default_slot: green
auto_rollback: false
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.public_ip.to_string(), "203.0.113.7");
        assert!(config.slot(Slot::Blue).is_loopback());
        assert_eq!(config.slot(Slot::Green).local_port, Some(9002));
        assert_eq!(config.health.timeout, Duration::from_secs(90));
        assert_eq!(config.probe.interval, Duration::from_millis(500));
        assert_eq!(config.edge.keep_backups, 3);
        assert_eq!(config.edge.extra_directives.len(), 2);
        assert_eq!(config.bring_up.command.program(), "podman-compose");
        assert_eq!(config.bring_up.timeout, Duration::from_secs(120));
        assert_eq!(config.default_slot, Slot::Green);
        assert!(!config.auto_rollback);
        assert_eq!(
            config.marker_path(),
            PathBuf::from("/srv/slotswap/active_color")
        );
    }
}

mod validation {
    use super::*;

    fn invalid(yaml: &str) -> String {
        match Config::from_yaml(yaml) {
            Err(Error::InvalidConfig(msg)) => msg,
            Err(other) => other.to_string(),
            Ok(_) => panic!("config should be rejected"),
        }
    }

    #[test]
    fn rejects_empty_domain() {
        let yaml = MINIMAL.replace("domain: api.example.com", "domain: \"  \"");
        assert!(invalid(&yaml).contains("domain"));
    }

    #[test]
    fn rejects_domain_with_braces() {
        let yaml = MINIMAL.replace("domain: api.example.com", "domain: \"api{.com\"");
        assert!(invalid(&yaml).contains("invalid domain"));
    }

    #[test]
    fn rejects_upstream_without_port() {
        let yaml = MINIMAL.replace("upstream: backend-green:8000", "upstream: backend-green");
        assert!(invalid(&yaml).contains("host:port"));
    }

    #[test]
    fn rejects_same_upstream_for_both_slots() {
        let yaml = MINIMAL.replace("upstream: backend-green:8000", "upstream: backend-blue:8000");
        assert!(invalid(&yaml).contains("different upstreams"));
    }

    #[test]
    fn rejects_unknown_fields() {
        let yaml = format!("{MINIMAL}colour: teal\n");
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn rejects_unbalanced_extra_directive() {
        let yaml = format!("{MINIMAL}edge:\n  extra_directives:\n    - \"log {{\"\n");
        let err = Config::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("unbalanced"));
    }

    #[test]
    fn rejects_zero_probe_retries() {
        let yaml = format!("{MINIMAL}probe:\n  retries: 0\n");
        assert!(invalid(&yaml).contains("retries"));
    }
}

mod discovery {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("custom.yml");
        fs::write(&explicit, MINIMAL.replace("api.example.com", "explicit.example.com")).unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), MINIMAL).unwrap();

        let config = Config::discover(Some(&explicit), dir.path()).unwrap();
        assert_eq!(config.domain, "explicit.example.com");
        assert_eq!(config.source.as_deref(), Some(explicit.as_path()));
    }

    #[test]
    fn env_var_beats_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let from_env = dir.path().join("env.yml");
        fs::write(&from_env, MINIMAL.replace("api.example.com", "env.example.com")).unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), MINIMAL).unwrap();

        temp_env::with_var(CONFIG_ENV, Some(from_env.as_os_str()), || {
            let config = Config::discover(None, dir.path()).unwrap();
            assert_eq!(config.domain, "env.example.com");
        });
    }

    #[test]
    fn finds_config_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME_ALT), MINIMAL).unwrap();

        temp_env::with_var_unset(CONFIG_ENV, || {
            let config = Config::discover(None, dir.path()).unwrap();
            assert_eq!(config.domain, "api.example.com");
            assert_eq!(config.project_dir(), Some(dir.path()));
        });
    }

    #[test]
    fn finds_config_in_dot_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".slotswap")).unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME_DIR), MINIMAL).unwrap();

        temp_env::with_var_unset(CONFIG_ENV, || {
            let config = Config::discover(None, dir.path()).unwrap();
            assert_eq!(config.domain, "api.example.com");
        });
    }
}

mod init {
    use super::*;

    #[test]
    fn init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = init_config(dir.path(), Some("shop.example.org"), false).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.domain, "shop.example.org");
        assert_eq!(config.slot(Slot::Blue).service.as_str(), "backend-blue");
    }

    #[test]
    fn init_refuses_existing_without_force() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), None, false).unwrap();

        assert!(matches!(
            init_config(dir.path(), None, false),
            Err(Error::AlreadyExists(_))
        ));
        assert!(init_config(dir.path(), None, true).is_ok());
    }
}
