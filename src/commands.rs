//! Subcommand dispatch
//!
//! Each subcommand resolves its arguments, takes the per-VRF lock when it
//! mutates state, and hands off to the lifecycle, verifier or classifier.
//! Reports and listings go to `out`; diagnostics go through `tracing`.

use crate::cgroup::{ClassifierStore, TaskClassifier};
use crate::config::cli::{Command, LinkCommand, TaskCommand};
use crate::config::AppConfig;
use crate::error::{AppError, NotFoundError};
use crate::gateway::KernelGateway;
use crate::lifecycle::{ConfigureMode, Lifecycle, LifecycleSettings};
use crate::lock::VrfLock;
use crate::services::ServiceManager;
use crate::verify::Verifier;
use crate::vrf::{parse_table_id, validate_name, Capability, TableResolver};
use std::io::{self, Write};
use tracing::debug;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;

pub struct Runner<'a, G, S, C> {
    gateway: &'a G,
    services: &'a S,
    cgroups: &'a C,
    config: &'a AppConfig,
    json: bool,
}

impl<'a, G, S, C> Runner<'a, G, S, C>
where
    G: KernelGateway,
    S: ServiceManager,
    C: ClassifierStore,
{
    pub fn new(
        gateway: &'a G,
        services: &'a S,
        cgroups: &'a C,
        config: &'a AppConfig,
        json: bool,
    ) -> Self {
        Self {
            gateway,
            services,
            cgroups,
            config,
            json,
        }
    }

    fn settings(&self) -> LifecycleSettings {
        LifecycleSettings {
            tables: self.config.table_range(),
            metric: self.config.default_route_metric,
            rule_priority: self.config.rule_priority,
            cgroup_retry: self.config.cgroup_retry(),
        }
    }

    async fn lifecycle(&self) -> Result<Lifecycle<'a, G, S, C>, AppError> {
        let capability = Capability::detect(self.gateway).await?;
        debug!(?capability, "Detected kernel capability");
        Ok(Lifecycle::new(
            self.gateway,
            self.services,
            self.cgroups,
            capability,
            self.settings(),
        ))
    }

    fn lock(&self, vrf: &str) -> Result<VrfLock, AppError> {
        validate_name(vrf)?;
        Ok(VrfLock::acquire(&self.config.lock_dir, vrf)?)
    }

    /// Run one subcommand, returning the process exit code
    pub async fn run<W: Write>(&self, command: Command, out: &mut W) -> Result<u8, AppError> {
        match command {
            Command::List => self.list(out).await,
            Command::Exists { vrf } => {
                validate_name(&vrf)?;
                if self.gateway.vrf_exists(&vrf).await? {
                    Ok(EXIT_SUCCESS)
                } else {
                    Ok(EXIT_FAILURE)
                }
            }
            Command::Configure { vrf, table, mode } => {
                let table = parse_table_id(&table)?;
                let mode = match mode.as_deref() {
                    Some("boot") => ConfigureMode::Boot,
                    _ => ConfigureMode::Normal,
                };
                let _lock = self.lock(&vrf)?;
                self.lifecycle().await?.configure(&vrf, table, mode).await?;
                Ok(EXIT_SUCCESS)
            }
            Command::Teardown { vrf, table } => {
                let table = parse_table_id(&table)?;
                let _lock = self.lock(&vrf)?;
                self.lifecycle().await?.teardown(&vrf, Some(table)).await?;
                Ok(EXIT_SUCCESS)
            }
            Command::Verify { vrf, table } => {
                self.verify(vrf.as_deref(), table.as_deref(), out).await
            }
            Command::Add { vrf, table, .. } => {
                let table = parse_table_id(&table)?;
                let _lock = self.lock(&vrf)?;
                self.lifecycle().await?.add(&vrf, table).await?;
                Ok(EXIT_SUCCESS)
            }
            Command::Del { vrf, table } => {
                let table = table.as_deref().map(parse_table_id).transpose()?;
                let _lock = self.lock(&vrf)?;
                self.lifecycle().await?.delete(&vrf, table).await?;
                Ok(EXIT_SUCCESS)
            }
            Command::Table { name } => {
                validate_name(&name)?;
                let table = TableResolver::new(self.gateway).lookup_any(&name).await?;
                writeln!(out, "{}", table)?;
                Ok(EXIT_SUCCESS)
            }
            Command::Task(task) => self.task(task, out).await,
            Command::Link(LinkCommand::List { vrf }) => self.links(vrf.as_deref(), out).await,
        }
    }

    async fn list<W: Write>(&self, out: &mut W) -> Result<u8, AppError> {
        let resolver = TableResolver::new(self.gateway);

        writeln!(out, "{:<16} Table", "VRF")?;
        for name in self.gateway.list_vrf_devices().await? {
            match resolver.lookup(&name).await {
                Ok(table) => writeln!(out, "{:<16} {}", name, table)?,
                Err(AppError::NotFound(_)) => writeln!(out, "{:<16} -", name)?,
                Err(e) => return Err(e),
            }
        }
        Ok(EXIT_SUCCESS)
    }

    async fn verify<W: Write>(
        &self,
        vrf: Option<&str>,
        table: Option<&str>,
        out: &mut W,
    ) -> Result<u8, AppError> {
        if let Some(vrf) = vrf {
            validate_name(vrf)?;
        }
        let table = table.map(parse_table_id).transpose()?;

        let report = Verifier::detecting(self.gateway, self.config.default_route_metric)
            .verify(vrf, table)
            .await;

        if self.json {
            serde_json::to_writer_pretty(&mut *out, &report).map_err(io::Error::from)?;
            writeln!(out)?;
        } else {
            write!(out, "{}", report.render())?;
        }

        Ok(if report.passed() {
            EXIT_SUCCESS
        } else {
            EXIT_FAILURE
        })
    }

    async fn links<W: Write>(&self, vrf: Option<&str>, out: &mut W) -> Result<u8, AppError> {
        let vrfs = match vrf {
            Some(vrf) => {
                validate_name(vrf)?;
                if !self.gateway.vrf_exists(vrf).await? {
                    return Err(NotFoundError::Vrf(vrf.to_string()).into());
                }
                vec![vrf.to_string()]
            }
            None => self.gateway.list_vrf_devices().await?,
        };

        let resolver = TableResolver::new(self.gateway);
        for vrf in vrfs {
            writeln!(out, "VRF {}", vrf)?;
            for device in self.gateway.list_enslaved(&vrf).await? {
                match resolver.lookup_by_device(&device).await {
                    Ok(table) => writeln!(out, "    {} (table {})", device, table)?,
                    Err(AppError::NotFound(_)) => writeln!(out, "    {}", device)?,
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(EXIT_SUCCESS)
    }

    async fn task<W: Write>(&self, task: TaskCommand, out: &mut W) -> Result<u8, AppError> {
        let classifier = TaskClassifier::new(self.cgroups);

        match task {
            TaskCommand::List { vrf } => {
                if let Some(vrf) = vrf.as_deref() {
                    validate_name(vrf)?;
                }
                for (vrf, pids) in classifier.list(vrf.as_deref())? {
                    writeln!(out, "VRF {}", vrf)?;
                    for pid in pids {
                        writeln!(out, "    {}", pid)?;
                    }
                }
            }
            TaskCommand::Identify { pid } => {
                writeln!(out, "{}", classifier.identify(pid)?)?;
            }
            TaskCommand::Set { vrf, pid } => {
                classifier.set(&vrf, pid)?;
            }
            TaskCommand::Exec { vrf, command } => {
                classifier.set(&vrf, std::process::id())?;
                return exec(&command).await;
            }
        }
        Ok(EXIT_SUCCESS)
    }
}

/// Run a program to completion and pass its exit code through
async fn exec(command: &[String]) -> Result<u8, AppError> {
    let Some((program, args)) = command.split_first() else {
        return Ok(EXIT_FAILURE);
    };

    let status = tokio::process::Command::new(program)
        .args(args)
        .status()
        .await?;

    Ok(status
        .code()
        .and_then(|code| u8::try_from(code).ok())
        .unwrap_or(EXIT_FAILURE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cgroup::fake::FakeStore;
    use crate::error::{LockError, ValidationError};
    use crate::gateway::fake::FakeGateway;
    use crate::services::fake::FakeServices;
    use tempfile::TempDir;

    struct Harness {
        gateway: FakeGateway,
        services: FakeServices,
        cgroups: FakeStore,
        config: AppConfig,
        _dir: TempDir,
    }

    impl Harness {
        fn new(gateway: FakeGateway) -> Self {
            let dir = TempDir::new().unwrap();
            let config = AppConfig {
                lock_dir: dir.path().to_path_buf(),
                cgroup_remove_delay_ms: 1,
                ..AppConfig::default()
            };
            Self {
                gateway,
                services: FakeServices::default(),
                cgroups: FakeStore::default(),
                config,
                _dir: dir,
            }
        }

        async fn run(&self, command: Command, json: bool) -> (Result<u8, AppError>, String) {
            let runner = Runner::new(
                &self.gateway,
                &self.services,
                &self.cgroups,
                &self.config,
                json,
            );
            let mut out = Vec::new();
            let result = runner.run(command, &mut out).await;
            (result, String::from_utf8(out).unwrap())
        }
    }

    fn verify(vrf: Option<&str>, table: Option<&str>) -> Command {
        Command::Verify {
            vrf: vrf.map(String::from),
            table: table.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_list() {
        let harness = Harness::new(
            FakeGateway::consolidated()
                .with_vrf("red", 1001)
                .with_vrf("blue", 1002),
        );

        let (result, out) = harness.run(Command::List, false).await;

        assert_eq!(result.unwrap(), EXIT_SUCCESS);
        assert!(out.contains("blue             1002\n"));
        assert!(out.contains("red              1001\n"));
    }

    #[tokio::test]
    async fn test_exists() {
        let harness = Harness::new(
            FakeGateway::consolidated()
                .with_vrf("red", 1001)
                .with_slave("eth1", "red"),
        );

        let exists = |vrf: &str| Command::Exists {
            vrf: vrf.to_string(),
        };
        assert_eq!(
            harness.run(exists("red"), false).await.0.unwrap(),
            EXIT_SUCCESS
        );
        assert_eq!(
            harness.run(exists("blue"), false).await.0.unwrap(),
            EXIT_FAILURE
        );
        // An enslaved device is not a VRF
        assert_eq!(
            harness.run(exists("eth1"), false).await.0.unwrap(),
            EXIT_FAILURE
        );
    }

    #[tokio::test]
    async fn test_del_and_verify_on_non_vrf_device() {
        let harness = Harness::new(
            FakeGateway::legacy()
                .with_vrf("red", 1001)
                .with_slave("eth1", "red"),
        );

        let del = Command::Del {
            vrf: "eth1".to_string(),
            table: None,
        };
        let (result, _) = harness.run(del, false).await;
        assert!(matches!(
            result,
            Err(AppError::NotFound(NotFoundError::Vrf(_)))
        ));
        assert!(harness.gateway.state().slaves.contains_key("eth1"));
        assert_eq!(harness.gateway.rule_mutations(), 0);
        assert!(harness.services.calls().is_empty());

        let (result, out) = harness.run(verify(Some("eth1"), None), false).await;
        assert_eq!(result.unwrap(), EXIT_FAILURE);
        assert!(out.contains("ERROR: VRF eth1 does not exist"));
    }

    #[tokio::test]
    async fn test_verify_reports_rule_dump_failure() {
        let harness = Harness::new(FakeGateway::legacy().with_vrf("red", 1001));
        harness.gateway.state().fail_rule_dump = true;

        let (result, out) = harness.run(verify(None, None), false).await;

        assert_eq!(result.unwrap(), EXIT_FAILURE);
        assert!(out.contains("ERROR: Unable to read FIB rules"));
        assert!(out.contains("ERROR: IPv4 unreachable default route missing in table 1001"));
        assert!(out.ends_with("Verification FAILED\n"));
    }

    #[tokio::test]
    async fn test_table_for_vrf_or_enslaved_device() {
        let harness = Harness::new(
            FakeGateway::consolidated()
                .with_vrf("red", 1001)
                .with_slave("eth1", "red"),
        );
        let table = |name: &str| Command::Table {
            name: name.to_string(),
        };

        let (result, out) = harness.run(table("red"), false).await;
        assert_eq!(result.unwrap(), EXIT_SUCCESS);
        assert_eq!(out, "1001\n");

        let (_, out) = harness.run(table("eth1"), false).await;
        assert_eq!(out, "1001\n");

        let (result, _) = harness.run(table("eth9"), false).await;
        assert!(matches!(
            result,
            Err(AppError::NotFound(NotFoundError::TableId(_)))
        ));
    }

    #[tokio::test]
    async fn test_list_marks_vrf_without_table() {
        let harness = Harness::new(FakeGateway::consolidated().with_vrf("red", 1001));
        harness.gateway.state().tableless.insert("red".to_string());

        let (result, out) = harness.run(Command::List, false).await;

        assert_eq!(result.unwrap(), EXIT_SUCCESS);
        assert!(out.contains("red              -\n"));
    }

    #[tokio::test]
    async fn test_add_then_verify_then_del() {
        let harness = Harness::new(FakeGateway::legacy());

        let add = Command::Add {
            vrf: "red".to_string(),
            keyword: "table".to_string(),
            table: "1001".to_string(),
        };
        assert_eq!(harness.run(add, false).await.0.unwrap(), EXIT_SUCCESS);

        let (result, out) = harness.run(verify(Some("red"), Some("1001")), false).await;
        assert_eq!(result.unwrap(), EXIT_SUCCESS, "{}", out);
        assert!(out.ends_with("Verification PASSED\n"));

        let del = Command::Del {
            vrf: "red".to_string(),
            table: None,
        };
        assert_eq!(harness.run(del, false).await.0.unwrap(), EXIT_SUCCESS);

        let (result, out) = harness.run(verify(Some("red"), None), false).await;
        assert_eq!(result.unwrap(), EXIT_FAILURE);
        assert!(out.contains("ERROR: VRF red does not exist"));
    }

    #[tokio::test]
    async fn test_verify_json() {
        let harness = Harness::new(FakeGateway::consolidated().with_vrf("red", 1001));

        let (result, out) = harness.run(verify(None, None), true).await;

        assert_eq!(result.unwrap(), EXIT_FAILURE);
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["capability"], "consolidated");
        assert_eq!(json["vrfs"][0]["name"], "red");
        assert_eq!(json["vrfs"][0]["findings"][0]["severity"], "error");
    }

    #[tokio::test]
    async fn test_bad_table_syntax() {
        let harness = Harness::new(FakeGateway::consolidated());

        let configure = Command::Configure {
            vrf: "red".to_string(),
            table: "10x1".to_string(),
            mode: None,
        };
        let (result, _) = harness.run(configure, false).await;

        assert!(matches!(
            result,
            Err(AppError::Validation(ValidationError::InvalidTableId(_)))
        ));
        assert_eq!(harness.gateway.state().route_adds, 0);
    }

    #[tokio::test]
    async fn test_held_lock_refuses_mutation() {
        let harness = Harness::new(FakeGateway::consolidated().with_vrf("red", 1001));
        let _held = VrfLock::acquire(&harness.config.lock_dir, "red").unwrap();

        let teardown = Command::Teardown {
            vrf: "red".to_string(),
            table: "1001".to_string(),
        };
        let (result, _) = harness.run(teardown, false).await;

        assert!(matches!(result, Err(AppError::Lock(LockError::Busy { .. }))));
        assert!(harness.services.calls().is_empty());
    }

    #[tokio::test]
    async fn test_task_set_and_identify() {
        let harness = Harness::new(FakeGateway::consolidated());

        let set = Command::Task(TaskCommand::Set {
            vrf: "red".to_string(),
            pid: 4242,
        });
        assert_eq!(harness.run(set, false).await.0.unwrap(), EXIT_SUCCESS);

        let (result, out) = harness
            .run(Command::Task(TaskCommand::Identify { pid: 4242 }), false)
            .await;
        assert_eq!(result.unwrap(), EXIT_SUCCESS);
        assert_eq!(out, "red\n");

        let (_, out) = harness
            .run(Command::Task(TaskCommand::Identify { pid: 1 }), false)
            .await;
        assert_eq!(out, "default\n");
    }

    #[tokio::test]
    async fn test_link_list() {
        let harness = Harness::new(
            FakeGateway::consolidated()
                .with_vrf("red", 1001)
                .with_slave("eth1", "red"),
        );

        let (result, out) = harness
            .run(Command::Link(LinkCommand::List { vrf: None }), false)
            .await;

        assert_eq!(result.unwrap(), EXIT_SUCCESS);
        assert_eq!(out, "VRF red\n    eth1 (table 1001)\n");
    }
}
