//! Role management
//!
//! A role is created or altered from `system_auth.roles`, then its keyspace
//! permissions and role memberships are reconciled. Revokes always run
//! before grants.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::session::{flag, text, text_list, CqlRow};
use super::{apply, literal, message, CqlSession, Presence};
use crate::errors::{OpsError, OpsResult};
use crate::observability::{log_event_with_fields, Event};
use crate::outcome::{ModuleOutcome, RunOptions};

/// Permission names accepted in `keyspace_permissions`
pub const PERMISSIONS: [&str; 7] = [
    "ALL PERMISSIONS",
    "CREATE",
    "ALTER",
    "AUTHORIZE",
    "DROP",
    "MODIFY",
    "SELECT",
];

/// What `ALL PERMISSIONS` expands to on a keyspace
const KEYSPACE_PERMISSIONS: [&str; 6] = ["ALTER", "DROP", "SELECT", "MODIFY", "AUTHORIZE", "CREATE"];

/// Key of `keyspace_permissions` that means every keyspace
pub const ALL_KEYSPACES: &str = "all_keyspaces";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRequest {
    pub name: String,
    #[serde(default)]
    pub state: Presence,
    #[serde(default)]
    pub super_user: bool,
    #[serde(default = "default_login")]
    pub login: bool,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub options: Option<BTreeMap<String, Value>>,
    /// Datacenters the role may access; `["ALL"]` means every one
    #[serde(default, alias = "data_centres")]
    pub data_centers: Option<Vec<String>>,
    /// Keyspace (or `all_keyspaces`) to permission names
    #[serde(default)]
    pub keyspace_permissions: Option<BTreeMap<String, Vec<String>>>,
    /// Roles this role should be a member of; unset leaves memberships alone
    #[serde(default)]
    pub roles: Option<Vec<String>>,
}

fn default_login() -> bool {
    true
}

impl RoleRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Presence::Present,
            super_user: false,
            login: default_login(),
            password: None,
            options: None,
            data_centers: None,
            keyspace_permissions: None,
            roles: None,
        }
    }

    /// CREATE or ALTER statement for this request
    pub fn statement(&self, alter: bool) -> String {
        let verb = if alter { "ALTER" } else { "CREATE" };
        let mut cql = format!(
            "{} ROLE {} WITH SUPERUSER = {} AND LOGIN = {}",
            verb, self.name, self.super_user, self.login
        );
        if let Some(pw) = &self.password {
            cql.push_str(&format!(" AND PASSWORD = {}", literal(pw)));
        }
        if let Some(options) = &self.options {
            let pairs: Vec<String> = options
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => format!("{} : {}", literal(k), literal(s)),
                    other => format!("{} : {}", literal(k), other),
                })
                .collect();
            cql.push_str(&format!(" AND OPTIONS = {{ {} }}", pairs.join(", ")));
        }
        if let Some(dcs) = &self.data_centers {
            if dcs.len() == 1 && dcs[0].eq_ignore_ascii_case("ALL") {
                cql.push_str(" AND ACCESS TO ALL DATACENTERS");
            } else if !dcs.is_empty() {
                let quoted: Vec<String> = dcs.iter().map(|d| literal(d)).collect();
                cql.push_str(&format!(" AND ACCESS TO DATACENTERS {{{}}}", quoted.join(", ")));
            }
        }
        cql
    }
}

/// Reject unknown permission names before touching the cluster
pub fn validate_permissions(permissions: &BTreeMap<String, Vec<String>>) -> OpsResult<()> {
    for (keyspace, perms) in permissions {
        if let Some(bad) = perms.iter().find(|p| !PERMISSIONS.contains(&p.as_str())) {
            return Err(OpsError::Validation(format!(
                "Invalid permission provided in the keyspace_permission parameter: {} on {}",
                bad, keyspace
            )));
        }
    }
    Ok(())
}

/// One row of `LIST ALL OF <role>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub role: String,
    pub resource: String,
    pub permission: String,
}

impl Grant {
    fn from_row(row: &CqlRow) -> Option<Self> {
        Some(Self {
            role: text(row, "role")?.to_string(),
            resource: text(row, "resource")?.to_string(),
            permission: text(row, "permission")?.to_string(),
        })
    }

    /// Keyspace of a `<keyspace ks>` resource
    fn keyspace(&self) -> Option<&str> {
        self.resource
            .strip_prefix("<keyspace ")
            .and_then(|r| r.strip_suffix('>'))
            .map(str::trim)
    }
}

fn resource_of(keyspace: &str) -> String {
    if keyspace == ALL_KEYSPACES {
        "<all keyspaces>".to_string()
    } else {
        format!("<keyspace {}>", keyspace)
    }
}

fn target_of(keyspace: &str) -> String {
    if keyspace == ALL_KEYSPACES {
        "ALL KEYSPACES".to_string()
    } else {
        format!("KEYSPACE {}", keyspace)
    }
}

/// Whether `grants` already give `role` the `permission` on `keyspace`.
///
/// `ALL PERMISSIONS` holds only when every keyspace permission is listed.
pub fn has_permission(grants: &[Grant], role: &str, permission: &str, keyspace: &str) -> bool {
    let resource = resource_of(keyspace);
    let held: BTreeSet<&str> = grants
        .iter()
        .filter(|g| g.role == role && g.resource == resource)
        .map(|g| g.permission.as_str())
        .collect();
    if permission == "ALL PERMISSIONS" {
        KEYSPACE_PERMISSIONS.iter().all(|p| held.contains(p))
    } else {
        held.contains(permission)
    }
}

/// GRANT and REVOKE statements, each set ordered and deduplicated
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatementPlan {
    pub grant: BTreeSet<String>,
    pub revoke: BTreeSet<String>,
}

impl StatementPlan {
    pub fn is_empty(&self) -> bool {
        self.grant.is_empty() && self.revoke.is_empty()
    }
}

/// Statements that bring `role`'s keyspace permissions to `wanted`.
///
/// Permissions held through other roles, and on resources other than
/// keyspaces, are left alone. With no `wanted` map every keyspace-level
/// permission is revoked.
pub fn plan_permissions(
    grants: &[Grant],
    role: &str,
    wanted: Option<&BTreeMap<String, Vec<String>>>,
) -> StatementPlan {
    let mut plan = StatementPlan::default();
    let own = grants.iter().filter(|g| g.role == role);

    let Some(wanted) = wanted else {
        for g in own {
            if let Some(ks) = g.keyspace() {
                plan.revoke
                    .insert(format!("REVOKE {} ON KEYSPACE {} FROM {}", g.permission, ks, role));
            }
        }
        return plan;
    };

    for (keyspace, perms) in wanted {
        for perm in perms {
            if !has_permission(grants, role, perm, keyspace) {
                plan.grant
                    .insert(format!("GRANT {} ON {} TO {}", perm, target_of(keyspace), role));
            }
        }
    }

    for g in own {
        if g.resource == "<all keyspaces>" {
            match wanted.get(ALL_KEYSPACES) {
                None => {
                    plan.revoke
                        .insert(format!("REVOKE ALL PERMISSIONS ON ALL KEYSPACES FROM {}", role));
                }
                Some(perms) if perms.iter().any(|p| p == "ALL PERMISSIONS") => {}
                Some(perms) if !perms.contains(&g.permission) => {
                    plan.revoke
                        .insert(format!("REVOKE {} ON ALL KEYSPACES FROM {}", g.permission, role));
                }
                Some(_) => {}
            }
        } else if let Some(ks) = g.keyspace() {
            match wanted.get(ks) {
                None => {
                    plan.revoke
                        .insert(format!("REVOKE {} ON KEYSPACE {} FROM {}", g.permission, ks, role));
                }
                Some(perms) if perms.iter().any(|p| p == "ALL PERMISSIONS") => {}
                Some(perms) if !perms.contains(&g.permission) => {
                    plan.revoke
                        .insert(format!("REVOKE {} ON KEYSPACE {} FROM {}", g.permission, ks, role));
                }
                Some(_) => {}
            }
        }
    }
    plan
}

/// Statements that make `role` a member of exactly `wanted`
pub fn plan_memberships(current: &[String], role: &str, wanted: &[String]) -> StatementPlan {
    let mut plan = StatementPlan::default();
    for r in current.iter().filter(|r| !wanted.contains(r)) {
        plan.revoke.insert(format!("REVOKE {} FROM {}", r, role));
    }
    for r in wanted.iter().filter(|r| !current.contains(r)) {
        plan.grant.insert(format!("GRANT {} TO {}", r, role));
    }
    plan
}

/// Current state of a role in `system_auth.roles`
#[derive(Debug, Clone, PartialEq, Eq)]
struct RoleProperties {
    is_superuser: bool,
    can_login: bool,
    member_of: Vec<String>,
}

fn role_properties(session: &dyn CqlSession, role: &str) -> OpsResult<Option<RoleProperties>> {
    let rows = session.query(&format!(
        "SELECT role, can_login, is_superuser, member_of FROM system_auth.roles WHERE role = {}",
        literal(role)
    ))?;
    Ok(rows.first().map(|row| RoleProperties {
        is_superuser: flag(row, "is_superuser"),
        can_login: flag(row, "can_login"),
        member_of: text_list(row, "member_of"),
    }))
}

fn list_grants(session: &dyn CqlSession, role: &str) -> OpsResult<Vec<Grant>> {
    let rows = session.query(&format!("LIST ALL OF {}", role))?;
    Ok(rows.iter().filter_map(Grant::from_row).collect())
}

fn run_plan(session: &dyn CqlSession, options: RunOptions, plan: &StatementPlan) -> OpsResult<()> {
    for cql in plan.revoke.iter().chain(plan.grant.iter()) {
        apply(session, options, cql)?;
    }
    Ok(())
}

fn plan_json(plan: &StatementPlan) -> Value {
    let mut m = Map::new();
    m.insert("grant".to_string(), Value::from_iter(plan.grant.iter().cloned()));
    m.insert("revoke".to_string(), Value::from_iter(plan.revoke.iter().cloned()));
    Value::Object(m)
}

/// Create, alter or drop a role and reconcile its grants.
///
/// Only `SUPERUSER` and `LOGIN` are compared for an existing role; a
/// password or options change alone does not trigger an ALTER.
pub fn ensure_role(
    session: &dyn CqlSession,
    request: &RoleRequest,
    options: RunOptions,
) -> OpsResult<ModuleOutcome> {
    if let Some(perms) = &request.keyspace_permissions {
        validate_permissions(perms)?;
    }
    let name = &request.name;
    let current = role_properties(session, name)?;

    if request.state == Presence::Absent {
        return match current {
            None => Ok(ModuleOutcome::unchanged(format!("role {} does not exist", name)).with("role", name)),
            Some(_) => {
                let cql = format!("DROP ROLE {}", name);
                apply(session, options, &cql)?;
                Ok(ModuleOutcome::changed(message(options, format!("role {} dropped", name)))
                    .with("role", name)
                    .with("cql", cql))
            }
        };
    }

    let mut changed = false;
    let mut msg = format!("role {} is unchanged", name);
    let mut cql = None;
    let mut member_of = Vec::new();

    match &current {
        None => {
            let stmt = request.statement(false);
            apply(session, options, &stmt)?;
            changed = true;
            msg = format!("role {} created", name);
            cql = Some(stmt);
        }
        Some(props) => {
            member_of = props.member_of.clone();
            if props.is_superuser != request.super_user || props.can_login != request.login {
                let stmt = request.statement(true);
                apply(session, options, &stmt)?;
                changed = true;
                msg = format!("role {} altered", name);
                cql = Some(stmt);
            } else {
                log_event_with_fields(Event::StateSatisfied, &[("role", name.as_str())]);
            }
        }
    }

    // A role created in check mode does not exist yet, so it holds nothing
    let grants = if current.is_none() && options.check_mode {
        Vec::new()
    } else {
        list_grants(session, name)?
    };

    let permissions = plan_permissions(&grants, name, request.keyspace_permissions.as_ref());
    run_plan(session, options, &permissions)?;

    let memberships = match &request.roles {
        Some(wanted) => plan_memberships(&member_of, name, wanted),
        None => StatementPlan::default(),
    };
    run_plan(session, options, &memberships)?;

    let mut outcome = ModuleOutcome::new(
        changed || !permissions.is_empty() || !memberships.is_empty(),
        message(options, msg),
    )
    .with("role", name);
    if let Some(stmt) = cql {
        outcome = outcome.with("cql", super::session::redact_cql(&stmt));
    }
    if !permissions.is_empty() {
        outcome = outcome.with("permissions", plan_json(&permissions));
    }
    if !memberships.is_empty() {
        outcome = outcome.with("roles", plan_json(&memberships));
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cql::session::{row, MemorySession};
    use serde_json::json;

    fn grant(role: &str, resource: &str, permission: &str) -> Grant {
        Grant {
            role: role.into(),
            resource: resource.into(),
            permission: permission.into(),
        }
    }

    fn perms(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|p| p.to_string()).collect()))
            .collect()
    }

    fn existing(session: &MemorySession, superuser: bool, login: bool, member_of: Value) {
        session.respond(
            "SELECT role, can_login",
            vec![row(&[
                ("role", json!("app")),
                ("is_superuser", json!(superuser)),
                ("can_login", json!(login)),
                ("member_of", member_of),
            ])],
        );
    }

    fn grant_row(permission: &str) -> CqlRow {
        row(&[
            ("role", json!("app")),
            ("username", json!("app")),
            ("resource", json!("<keyspace app>")),
            ("permission", json!(permission)),
        ])
    }

    #[test]
    fn test_statement() {
        let mut req = RoleRequest::new("app");
        req.password = Some("pw".into());
        req.data_centers = Some(vec!["dc1".into(), "dc2".into()]);
        assert_eq!(
            req.statement(false),
            "CREATE ROLE app WITH SUPERUSER = false AND LOGIN = true AND PASSWORD = 'pw' \
             AND ACCESS TO DATACENTERS {'dc1', 'dc2'}"
        );
        req.data_centers = Some(vec!["all".into()]);
        assert!(req.statement(true).ends_with("AND ACCESS TO ALL DATACENTERS"));
    }

    #[test]
    fn test_invalid_permission_rejected_first() {
        let session = MemorySession::new();
        let mut req = RoleRequest::new("app");
        req.keyspace_permissions = Some(perms(&[("app", &["SELECT", "READ"])]));

        assert!(ensure_role(&session, &req, RunOptions::default()).unwrap_err().is_validation());
        assert!(session.executed().is_empty());
    }

    #[test]
    fn test_all_permissions_needs_every_grant() {
        let mut grants: Vec<Grant> = KEYSPACE_PERMISSIONS[..5]
            .iter()
            .map(|p| grant("app", "<keyspace app>", p))
            .collect();
        assert!(!has_permission(&grants, "app", "ALL PERMISSIONS", "app"));
        grants.push(grant("app", "<keyspace app>", "CREATE"));
        assert!(has_permission(&grants, "app", "ALL PERMISSIONS", "app"));
        assert!(has_permission(&grants, "app", "SELECT", "app"));
        assert!(!has_permission(&grants, "app", "SELECT", "other"));
    }

    #[test]
    fn test_plan_permissions() {
        let grants = vec![
            grant("app", "<keyspace app>", "SELECT"),
            grant("app", "<keyspace app>", "DROP"),
            grant("app", "<keyspace old>", "SELECT"),
            grant("app", "<all keyspaces>", "SELECT"),
            grant("base", "<keyspace app>", "MODIFY"),
        ];
        let wanted = perms(&[("app", &["SELECT", "MODIFY"])]);
        let plan = plan_permissions(&grants, "app", Some(&wanted));

        assert_eq!(
            plan.grant,
            BTreeSet::from(["GRANT MODIFY ON KEYSPACE app TO app".to_string()])
        );
        assert_eq!(
            plan.revoke,
            BTreeSet::from([
                "REVOKE ALL PERMISSIONS ON ALL KEYSPACES FROM app".to_string(),
                "REVOKE DROP ON KEYSPACE app FROM app".to_string(),
                "REVOKE SELECT ON KEYSPACE old FROM app".to_string(),
            ])
        );
    }

    #[test]
    fn test_all_permissions_keeps_keyspace_grants() {
        let grants: Vec<Grant> = KEYSPACE_PERMISSIONS
            .iter()
            .map(|p| grant("app", "<keyspace app>", p))
            .collect();
        let wanted = perms(&[("app", &["ALL PERMISSIONS"])]);
        assert!(plan_permissions(&grants, "app", Some(&wanted)).is_empty());
    }

    #[test]
    fn test_plan_memberships() {
        let plan = plan_memberships(
            &["dev".to_string(), "ops".to_string()],
            "app",
            &["ops".to_string(), "audit".to_string()],
        );
        assert_eq!(plan.revoke, BTreeSet::from(["REVOKE dev FROM app".to_string()]));
        assert_eq!(plan.grant, BTreeSet::from(["GRANT audit TO app".to_string()]));
    }

    #[test]
    fn test_create_role_with_grants() {
        let session = MemorySession::new();
        let mut req = RoleRequest::new("app");
        req.password = Some("secret".into());
        req.keyspace_permissions = Some(perms(&[("app", &["SELECT"])]));
        req.roles = Some(vec!["readers".into()]);

        let outcome = ensure_role(&session, &req, RunOptions::default()).unwrap();
        assert!(outcome.changed);
        assert_eq!(
            session.mutations(),
            vec![
                "CREATE ROLE app WITH SUPERUSER = false AND LOGIN = true AND PASSWORD = 'secret'".to_string(),
                "GRANT SELECT ON KEYSPACE app TO app".to_string(),
                "GRANT readers TO app".to_string(),
            ]
        );
        assert!(outcome.get("cql").unwrap().as_str().unwrap().contains("'********'"));
    }

    #[test]
    fn test_existing_role_is_idempotent() {
        let session = MemorySession::new();
        existing(&session, false, true, json!(["readers"]));
        session.respond(
            "LIST ALL OF app",
            vec![grant_row("SELECT")],
        );
        let mut req = RoleRequest::new("app");
        req.keyspace_permissions = Some(perms(&[("app", &["SELECT"])]));
        req.roles = Some(vec!["readers".into()]);

        let outcome = ensure_role(&session, &req, RunOptions::default()).unwrap();
        assert!(!outcome.changed);
        assert!(session.mutations().is_empty());
    }

    #[test]
    fn test_alter_on_login_change() {
        let session = MemorySession::new();
        existing(&session, false, true, Value::Null);
        let mut req = RoleRequest::new("app");
        req.login = false;

        let outcome = ensure_role(&session, &req, RunOptions::default()).unwrap();
        assert_eq!(outcome.msg, "role app altered");
        assert_eq!(
            session.mutations(),
            vec!["ALTER ROLE app WITH SUPERUSER = false AND LOGIN = false".to_string()]
        );
    }

    #[test]
    fn test_drop_in_check_mode() {
        let session = MemorySession::new();
        existing(&session, false, true, Value::Null);
        let req = RoleRequest {
            state: Presence::Absent,
            ..RoleRequest::new("app")
        };

        let outcome = ensure_role(&session, &req, RunOptions::check()).unwrap();
        assert!(outcome.changed);
        assert!(session.mutations().is_empty());
    }

    #[test]
    fn test_revokes_run_before_grants() {
        let session = MemorySession::new();
        existing(&session, false, true, Value::Null);
        session.respond(
            "LIST ALL OF app",
            vec![grant_row("DROP")],
        );
        let mut req = RoleRequest::new("app");
        req.keyspace_permissions = Some(perms(&[("app", &["SELECT"])]));

        ensure_role(&session, &req, RunOptions::default()).unwrap();
        assert_eq!(
            session.mutations(),
            vec![
                "REVOKE DROP ON KEYSPACE app FROM app".to_string(),
                "GRANT SELECT ON KEYSPACE app TO app".to_string(),
            ]
        );
    }
}
