use super::ProbeContext;
use crate::error::ProbeError;
use crate::report::PermissionFinding;
use tracing::{info, warn};

const WRITE_PROBE: &str = "touch /.dockprobe-write-test && rm -f /.dockprobe-write-test";

/// Raw answers from inside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionFacts {
    pub user: String,
    pub uid: Option<u32>,
    pub writable_filesystem: bool,
    pub sudo_present: bool,
}

/// Check identity, root filesystem writability and presence of sudo.
pub fn check_permissions(ctx: &ProbeContext<'_>) -> PermissionFinding {
    info!("Checking container permissions");
    let result = ctx.with_container("permissions", |container| {
        let id = container.id();
        let user = ctx
            .engine
            .exec(id, &["whoami"])
            .map(|out| out.trim().to_string())
            .map_err(|e| ProbeError::measurement("permissions", e.message))?;
        let uid = ctx
            .engine
            .exec(id, &["id", "-u"])
            .ok()
            .and_then(|out| out.trim().parse().ok());
        let writable_filesystem = ctx.engine.exec(id, &["sh", "-c", WRITE_PROBE]).is_ok();
        let sudo_present = ctx
            .engine
            .exec(id, &["sh", "-c", "command -v sudo"])
            .is_ok_and(|out| !out.trim().is_empty());

        Ok(PermissionFacts {
            user,
            uid,
            writable_filesystem,
            sudo_present,
        })
    });

    match result {
        Ok(facts) => evaluate(facts),
        Err(e) => {
            warn!("Permission probe degraded: {}", e);
            PermissionFinding::unknown(&e.to_string())
        }
    }
}

/// Turn raw facts into issues and suggestions, in a fixed order.
pub fn evaluate(facts: PermissionFacts) -> PermissionFinding {
    let running_as_root = facts.user == "root" || facts.uid == Some(0);
    let mut issues = Vec::new();
    let mut suggestions = Vec::new();

    if running_as_root {
        issues.push("Container runs as root".to_string());
        suggestions.push("Add a non-root USER instruction to the Dockerfile".to_string());
    }
    if facts.writable_filesystem {
        issues.push("Root filesystem is writable".to_string());
        suggestions.push(
            "Run with --read-only and mount writable volumes only where needed".to_string(),
        );
    }
    if facts.sudo_present {
        issues.push("sudo is installed in the image".to_string());
        suggestions.push("Remove sudo from the runtime image".to_string());
    }

    PermissionFinding {
        checked: true,
        user: facts.user,
        running_as_root,
        writable_filesystem: facts.writable_filesystem,
        sudo_present: facts.sudo_present,
        issues,
        suggestions,
    }
}
