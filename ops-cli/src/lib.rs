//! Operations CLI for the document service
//!
//! ```bash
//! # Mint an identity token for local testing
//! JWT_SECRET=dev-secret docs-ops token alice --org acme --email alice@acme.test
//!
//! # Print the authorization model to load into an OpenFGA store
//! docs-ops model > model.fga
//! ```

use anyhow::Context;
use auth_openfga::Schema;
use clap::{Parser, Subcommand};
use docs_server::{
    auth::{IdentityClaims, TokenService},
    config::{JwtConfig, DEFAULT_JWT_ISSUER},
};
use secrecy::Secret;

#[derive(Parser, Debug)]
#[command(name = "docs-ops")]
#[command(about = "Operator tooling for the document service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign an identity token accepted by the document API
    Token(TokenArgs),
    /// Print the document authorization model in OpenFGA DSL
    Model,
}

#[derive(clap::Args, Debug)]
pub struct TokenArgs {
    /// User identifier (`alice` or `user:alice`)
    pub user_id: String,

    #[arg(long)]
    pub email: Option<String>,

    /// Organization the caller acts for
    #[arg(long = "org")]
    pub organization_id: Option<String>,

    /// Shared signing secret
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub secret: String,

    #[arg(long, env = "JWT_ISSUER", default_value = DEFAULT_JWT_ISSUER)]
    pub issuer: String,

    /// Token lifetime in hours
    #[arg(long, default_value_t = 24)]
    pub ttl_hours: i64,
}

/// Execute one command and return what should be printed
pub fn run(command: Command) -> anyhow::Result<String> {
    match command {
        Command::Token(args) => mint_token(args),
        Command::Model => {
            let schema = Schema::document_model();
            schema.validate().context("Built-in authorization model is invalid")?;
            Ok(schema.to_dsl())
        }
    }
}

fn mint_token(args: TokenArgs) -> anyhow::Result<String> {
    if args.ttl_hours <= 0 {
        anyhow::bail!("--ttl-hours must be positive");
    }

    let ttl = chrono::Duration::try_hours(args.ttl_hours)
        .filter(|ttl| chrono::Utc::now().checked_add_signed(*ttl).is_some())
        .context("--ttl-hours is too large")?;

    let tokens = TokenService::new(&JwtConfig {
        secret: Secret::new(args.secret),
        issuer: args.issuer.clone(),
    });

    let mut claims = IdentityClaims::new(
        args.user_id,
        args.issuer,
        ttl,
    );
    if let Some(email) = args.email {
        claims = claims.with_email(email);
    }
    if let Some(org) = args.organization_id {
        claims = claims.with_organization(org);
    }

    tokens.issue(&claims).context("Failed to sign token")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_minted_token_verifies() {
        let cli = parse(&[
            "docs-ops", "token", "alice", "--org", "acme", "--secret", "dev-secret",
        ]);
        let token = run(cli.command).unwrap();

        let tokens = TokenService::new(&JwtConfig {
            secret: Secret::new("dev-secret".to_string()),
            issuer: DEFAULT_JWT_ISSUER.to_string(),
        });
        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.user_id, "alice");
        assert_eq!(claims.organization_id.as_deref(), Some("acme"));
        assert_eq!(claims.email, None);
    }

    #[test]
    fn test_rejects_non_positive_ttl() {
        let cli = parse(&[
            "docs-ops", "token", "alice", "--secret", "x", "--ttl-hours", "0",
        ]);
        assert!(run(cli.command).is_err());
    }

    #[test]
    fn test_rejects_ttl_past_representable_time() {
        for ttl in ["9223372036854775807", "2400000000"] {
            let cli = parse(&[
                "docs-ops", "token", "alice", "--secret", "x", "--ttl-hours", ttl,
            ]);
            let err = run(cli.command).unwrap_err();
            assert!(err.to_string().contains("too large"), "ttl {}: {}", ttl, err);
        }
    }

    #[test]
    fn test_model_prints_dsl() {
        let dsl = run(parse(&["docs-ops", "model"]).command).unwrap();
        assert!(dsl.starts_with("model\n"));
        assert!(dsl.contains("type document"));
    }
}
