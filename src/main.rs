use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use orgmove::cli::{self, Args, Command, ParsedConfig, Side};
use orgmove::ghas::{activate_ghas_features, change_repository_ghas, GhasScope};
use orgmove::github_provider::configure_provider;
use orgmove::orchestrator::{MigrationStatus, OrganizationMigration};
use orgmove::pipeline::{migrate_code_scanning_alerts, migrate_repository, MigrationContext};
use orgmove::provider::Provider;
use orgmove::secret_scanning::migrate_secret_scanning;
use orgmove::transfer::GeiTransfer;
use orgmove::workflows::reactivate_target_workflows;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = cli::load(&args)?;
    orgmove::logging::init(config.debug);

    let ctx = context(&config)?;
    run(args.command, &config, ctx).await
}

fn context(config: &ParsedConfig) -> Result<MigrationContext> {
    let source = configure_provider(&config.source_token, None)
        .context("could not create the source organization client")?;
    let target = configure_provider(&config.target_token, None)
        .context("could not create the target organization client")?;
    let transfer = GeiTransfer::new(
        config.gh_path.as_str(),
        config.source_org.as_str(),
        config.target_org.as_str(),
        config.source_token.as_str(),
        config.target_token.as_str(),
    );

    Ok(MigrationContext {
        source_org: config.source_org.clone(),
        target_org: config.target_org.clone(),
        source: Arc::new(source),
        target: Arc::new(target),
        transfer: Arc::new(transfer),
        retry: config.retry,
        settle_delay: config.settle_delay,
    })
}

fn side<'a>(ctx: &'a MigrationContext, side: Side) -> (&'a dyn Provider, &'a str) {
    match side {
        Side::Source => (ctx.source.as_ref(), ctx.source_org.as_str()),
        Side::Target => (ctx.target.as_ref(), ctx.target_org.as_str()),
    }
}

async fn run(command: Command, config: &ParsedConfig, ctx: MigrationContext) -> Result<()> {
    match command {
        Command::MigrateOrganization => {
            let result = OrganizationMigration::new(ctx)
                .workers(config.workers)
                .exclude(config.exclude.clone())
                .report_path(config.report_path.clone())
                .migrate()
                .await?;
            info!(
                migrated = result.migrated.len(),
                failed = result.failed.len(),
                report = ?config.report_path,
                "organization migration finished"
            );
            if !result.failed.is_empty() {
                bail!("{} repositories failed to migrate", result.failed.len());
            }
        }
        Command::MigrateRepository { repo } => {
            let repository = ctx
                .source
                .get_repository(&ctx.source_org, &repo)
                .await
                .with_context(|| format!("could not fetch {}/{}", ctx.source_org, repo))?;
            migrate_repository(&ctx, &repository).await?;
            info!(repository = %repo, "repository migrated");
        }
        Command::MigrateSecretScanning { repo } => {
            let failed = migrate_secret_scanning(&ctx, repo.as_deref()).await?;
            if !failed.is_empty() {
                bail!(
                    "secret scanning migration failed for: {}",
                    failed.join(", ")
                );
            }
        }
        Command::MigrateCodeScanning { repo } => {
            migrate_code_scanning_alerts(&ctx, &repo).await?;
            info!(repository = %repo, "code scanning alerts migrated");
        }
        Command::ReactivateTargetWorkflows { repo } => {
            reactivate_target_workflows(&ctx, &repo).await?;
        }
        Command::MigrationStatus => {
            let status = OrganizationMigration::new(ctx)
                .exclude(config.exclude.clone())
                .status()
                .await?;
            print_status(&status);
        }
        Command::DeleteBranchProtections { repo, side: which } => {
            let (provider, owner) = side(&ctx, which);
            let deleted = provider.delete_branch_protections(owner, &repo).await?;
            info!(repository = %repo, deleted, "branch protection rules deleted");
        }
        Command::ChangeVisibility {
            repo,
            visibility,
            side: which,
        } => {
            let (provider, owner) = side(&ctx, which);
            provider
                .change_repository_visibility(owner, &repo, visibility)
                .await?;
            info!(repository = %repo, %visibility, "visibility changed");
        }
        Command::GhasRepoSettings {
            repo,
            activate,
            side: which,
            ..
        } => {
            let (provider, owner) = side(&ctx, which);
            change_repository_ghas(provider, owner, &repo, activate).await?;
        }
        Command::ActivateGhasFeatures {
            enterprise,
            organization,
            side: which,
        } => {
            let (provider, _) = side(&ctx, which);
            let scope = match (organization, enterprise) {
                (Some(login), _) => GhasScope::Organization(login),
                (None, Some(slug)) => GhasScope::Enterprise(slug),
                (None, None) => bail!("either --organization or --enterprise is required"),
            };
            let failed = activate_ghas_features(provider, &scope).await?;
            if !failed.is_empty() {
                bail!("could not activate GHAS for: {}", failed.join(", "));
            }
        }
        Command::GhasOrgSettings {
            activate,
            side: which,
            ..
        } => {
            let (provider, owner) = side(&ctx, which);
            provider.change_ghas_org_settings(owner, activate).await?;
            if activate {
                info!(organization = owner, "GHAS enabled for new repositories");
            } else {
                warn!(organization = owner, "GHAS disabled for new repositories");
            }
        }
    }

    Ok(())
}

fn print_status(status: &MigrationStatus) {
    match status {
        MigrationStatus::NotStarted => println!("Migration not started"),
        MigrationStatus::Completed { url } => {
            println!("Migration completed, see {} for the result", url)
        }
        MigrationStatus::InProgress { migrated, pending } => {
            let total = migrated.len() + pending.len();
            println!("Migration in progress: {}/{}", migrated.len(), total);
            println!("Migrated:");
            for name in migrated {
                println!("  {}", name);
            }
            println!("Pending:");
            for name in pending {
                println!("  {}", name);
            }
        }
    }
}
