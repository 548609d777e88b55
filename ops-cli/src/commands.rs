use crate::cli::{Command, OutputFormat, Preset};
use auth_access_control::{
    AccessControlAdmin, AccessControlConfig, AccessControlEngine, AccessRuleRepository,
    GateDecision, GroupQuery, InMemoryAccessControlStore, RequestContext, RequestGate, Resource,
    UserScope,
};
use error_common::{ErrorContext, ImageVaultError, Result};
use logger_redacted::{redacted_info, CredentialRedactor, LoggerConfig};
use secrecy::ExposeSecret;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Text to print and the process exit code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    pub exit_code: i32,
}

impl CommandOutput {
    fn success(text: String) -> Self {
        Self { text, exit_code: 0 }
    }
}

/// Logging section of the configuration file, defaults when absent
pub fn load_logger_config(path: &Path) -> LoggerConfig {
    config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .build()
        .and_then(|config| config.get::<LoggerConfig>("logging"))
        .unwrap_or_default()
}

/// Error context naming the key, resource and user a command was about
pub fn error_context(command: &Command) -> ErrorContext {
    match command {
        Command::Check {
            public_key,
            resource,
            user,
            ..
        } => {
            let context = ErrorContext::new()
                .with_public_key(public_key.as_str())
                .with_resource(resource.as_str());
            match user {
                Some(user) => context.with_user(user.as_str()),
                None => context,
            }
        }
        Command::Users {
            public_key,
            resource,
        } => ErrorContext::new()
            .with_public_key(public_key.as_str())
            .with_resource(resource.as_str()),
        Command::Rules { public_key, .. } => ErrorContext::new().with_public_key(public_key.as_str()),
        Command::Validate { .. } | Command::Groups { .. } | Command::Resources { .. } => {
            ErrorContext::new()
        }
    }
}

/// Everything the commands operate on, built from one configuration file
pub struct Workspace {
    config: AccessControlConfig,
    store: Arc<InMemoryAccessControlStore>,
    redactor: CredentialRedactor,
}

impl Workspace {
    pub fn load(path: &Path, redactor: CredentialRedactor) -> Result<Self> {
        let config = AccessControlConfig::load(path)?;
        let store = Arc::new(InMemoryAccessControlStore::from_config(&config)?);
        debug!(path = %path.display(), "Loaded access control config");

        Ok(Self {
            config,
            store,
            redactor,
        })
    }

    fn engine(&self) -> AccessControlEngine {
        AccessControlEngine::from_store(self.store.clone())
    }

    fn admin(&self) -> AccessControlAdmin {
        AccessControlAdmin::from_store(self.store.clone())
    }

    fn gate(&self) -> RequestGate {
        RequestGate::new(self.engine())
            .with_additional_resources(self.config.additional_resources.iter().cloned())
    }
}

/// Run a command; `workspace` is `None` only for commands that need no config
pub async fn run(
    command: &Command,
    workspace: Option<&Workspace>,
    format: OutputFormat,
) -> Result<CommandOutput> {
    match command {
        Command::Resources { preset } => Ok(CommandOutput::success(resources(*preset))),
        Command::Validate { show_keys } => validate(require(workspace)?, *show_keys).await,
        Command::Check {
            public_key,
            resource,
            user,
            route_public_key,
            route_group,
        } => {
            let mut request = RequestContext::new(public_key.clone(), resource.clone());
            request.user.clone_from(user);
            request.route_public_key.clone_from(route_public_key);
            request.route_group.clone_from(route_group);
            check(require(workspace)?, &request, format).await
        }
        Command::Users {
            public_key,
            resource,
        } => {
            let scope = require(workspace)?
                .engine()
                .users_for_resource(public_key, resource)
                .await?;
            Ok(CommandOutput::success(render_scope(&scope)))
        }
        Command::Rules {
            public_key,
            expand_groups,
        } => {
            let admin = require(workspace)?.admin();
            let text = if *expand_groups {
                render(&admin.list_expanded_rules(public_key).await?, format)?
            } else {
                render(&admin.list_rules(public_key).await?, format)?
            };
            Ok(CommandOutput::success(text))
        }
        Command::Groups { page, limit } => {
            let listing = require(workspace)?
                .admin()
                .list_groups(GroupQuery::new(*page, *limit))
                .await?;
            Ok(CommandOutput::success(render(&listing, format)?))
        }
    }
}

fn require(workspace: Option<&Workspace>) -> Result<&Workspace> {
    workspace.ok_or_else(|| {
        ImageVaultError::ConfigError("This command requires a configuration file".to_string())
    })
}

async fn validate(workspace: &Workspace, show_keys: bool) -> Result<CommandOutput> {
    let mut rules = 0;
    for key_pair in &workspace.config.key_pairs {
        rules += workspace
            .store
            .get_access_list_for_public_key(&key_pair.public_key)
            .await?
            .len();
    }

    let mut text = format!(
        "Configuration is valid: {} key pairs, {} access rules, {} groups, {} additional resources ({})",
        workspace.config.key_pairs.len(),
        rules,
        workspace.config.groups.len(),
        workspace.config.additional_resources.len(),
        if workspace.config.mutable { "mutable" } else { "immutable" },
    );

    if show_keys {
        for key_pair in &workspace.config.key_pairs {
            text.push_str(&format!(
                "\n  publicKey={} privateKey={} rules={}",
                key_pair.public_key,
                workspace
                    .redactor
                    .mask_secret(key_pair.private_key.expose_secret()),
                key_pair.acl.len()
            ));
        }
    }

    Ok(CommandOutput::success(text))
}

async fn check(
    workspace: &Workspace,
    request: &RequestContext,
    format: OutputFormat,
) -> Result<CommandOutput> {
    let decision = workspace.gate().check(request).await?;
    redacted_info!(
        workspace.redactor,
        "Gate decision for publicKey={} resource={}: {:?}",
        request.public_key,
        request.resource,
        decision
    );

    let exit_code = match decision {
        GateDecision::Granted(_) => 0,
        GateDecision::Denied => 1,
        GateDecision::Rejected(_) => 2,
    };

    Ok(CommandOutput {
        text: render(&decision, format)?,
        exit_code,
    })
}

fn resources(preset: Preset) -> String {
    let resources = match preset {
        Preset::ReadOnly => Resource::read_only(),
        Preset::ReadWrite => Resource::read_write(),
        Preset::All => Resource::all(),
    };

    resources
        .iter()
        .map(Resource::as_str)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_scope(scope: &UserScope) -> String {
    match scope {
        UserScope::Wildcard => "*".to_string(),
        UserScope::Specific(users) if users.is_empty() => "(no users)".to_string(),
        UserScope::Specific(users) => users.iter().cloned().collect::<Vec<_>>().join("\n"),
    }
}

fn render<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value).map_err(anyhow::Error::from)?,
        OutputFormat::Yaml => serde_yaml::to_string(value).map_err(anyhow::Error::from)?,
    };
    Ok(text.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG: &str = r#"
logging:
  level: warn
  format: json
key_pairs:
  - public_key: acme
    private_key: acme-private-key
    acl:
      - resources: [image.get]
        users: [alice, bob]
      - group: stats
        users: "*"
groups:
  - { name: stats, resources: [stats.get] }
  - { name: archive, resources: [images.get] }
additional_resources: [stats.get]
"#;

    fn write_config() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();
        file
    }

    fn workspace(file: &tempfile::NamedTempFile) -> Workspace {
        Workspace::load(file.path(), CredentialRedactor::default()).unwrap()
    }

    #[test]
    fn test_logger_section() {
        let file = write_config();
        let logger = load_logger_config(file.path());
        assert_eq!(logger.level, "warn");
        assert_eq!(logger.format, logger_redacted::LogFormat::Json);

        let missing = load_logger_config(Path::new("/nonexistent/acl.yaml"));
        assert_eq!(missing.level, "info");
    }

    #[tokio::test]
    async fn test_validate_masks_private_keys() {
        let file = write_config();
        let workspace = workspace(&file);

        let output = run(&Command::Validate { show_keys: true }, Some(&workspace), OutputFormat::Json)
            .await
            .unwrap();

        assert_eq!(output.exit_code, 0);
        assert!(output.text.contains("1 key pairs, 2 access rules, 2 groups"));
        assert!(output.text.contains("publicKey=acme"));
        assert!(!output.text.contains("acme-private-key"));
    }

    #[tokio::test]
    async fn test_validate_masks_private_keys_with_separators() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(
            br#"
key_pairs:
  - public_key: acme
    private_key: "top secret;tail-of-secret"
"#,
        )
        .unwrap();

        for redactor in [CredentialRedactor::default(), CredentialRedactor::disabled()] {
            let workspace = Workspace::load(file.path(), redactor).unwrap();
            let output = run(&Command::Validate { show_keys: true }, Some(&workspace), OutputFormat::Json)
                .await
                .unwrap();

            assert!(output.text.contains("publicKey=acme"));
            assert!(!output.text.contains("secret"));
            assert!(!output.text.contains("tail-of"));
        }
    }

    #[tokio::test]
    async fn test_check_exit_codes() {
        let file = write_config();
        let workspace = workspace(&file);

        let check = |user: Option<&str>, resource: &str| Command::Check {
            public_key: "acme".to_string(),
            resource: resource.to_string(),
            user: user.map(ToString::to_string),
            route_public_key: None,
            route_group: None,
        };

        let granted = run(&check(Some("alice"), "image.get"), Some(&workspace), OutputFormat::Json)
            .await
            .unwrap();
        assert_eq!(granted.exit_code, 0);
        assert!(granted.text.contains("granted"));

        let denied = run(&check(Some("carol"), "image.get"), Some(&workspace), OutputFormat::Json)
            .await
            .unwrap();
        assert_eq!(denied.exit_code, 1);

        let rejected = run(&check(None, "nothing.get"), Some(&workspace), OutputFormat::Yaml)
            .await
            .unwrap();
        assert_eq!(rejected.exit_code, 2);
        assert!(rejected.text.contains("unknown_resource"));
    }

    #[tokio::test]
    async fn test_users_and_rules() {
        let file = write_config();
        let workspace = workspace(&file);

        let users = run(
            &Command::Users {
                public_key: "acme".to_string(),
                resource: "image.get".to_string(),
            },
            Some(&workspace),
            OutputFormat::Json,
        )
        .await
        .unwrap();
        assert_eq!(users.text, "alice\nbob");

        let rules = run(
            &Command::Rules {
                public_key: "acme".to_string(),
                expand_groups: true,
            },
            Some(&workspace),
            OutputFormat::Json,
        )
        .await
        .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&rules.text).unwrap();
        assert_eq!(parsed.as_array().map(Vec::len), Some(2));
        assert!(rules.text.contains("stats.get"));

        let err = run(
            &Command::Rules {
                public_key: "ghost".to_string(),
                expand_groups: false,
            },
            Some(&workspace),
            OutputFormat::Json,
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_groups_page() {
        let file = write_config();
        let workspace = workspace(&file);

        let output = run(&Command::Groups { page: 1, limit: 1 }, Some(&workspace), OutputFormat::Json)
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output.text).unwrap();
        assert_eq!(parsed["search"]["hits"], 2);
        assert_eq!(parsed["groups"][0]["name"], "archive");
    }

    #[tokio::test]
    async fn test_resources_without_config() {
        let output = run(&Command::Resources { preset: Preset::ReadOnly }, None, OutputFormat::Json)
            .await
            .unwrap();
        assert!(output.text.lines().any(|line| line == "image.get"));
        assert!(!output.text.lines().any(|line| line == "images.post"));

        let err = run(&Command::Validate { show_keys: false }, None, OutputFormat::Json)
            .await
            .unwrap_err();
        assert!(matches!(err, ImageVaultError::ConfigError(_)));
    }
}
