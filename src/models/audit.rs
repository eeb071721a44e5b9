use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const DEFAULT_AUDIT_LIMIT: i64 = 50;
pub const MAX_AUDIT_LIMIT: i64 = 200;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Restore,
    Login,
    Logout,
    LoginFailed,
    PasswordChange,
    Export,
    Complete,
    Cancel,
    Confirm,
    Reject,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
            AuditAction::Restore => "RESTORE",
            AuditAction::Login => "LOGIN",
            AuditAction::Logout => "LOGOUT",
            AuditAction::LoginFailed => "LOGIN_FAILED",
            AuditAction::PasswordChange => "PASSWORD_CHANGE",
            AuditAction::Export => "EXPORT",
            AuditAction::Complete => "COMPLETE",
            AuditAction::Cancel => "CANCEL",
            AuditAction::Confirm => "CONFIRM",
            AuditAction::Reject => "REJECT",
        }
    }
}

/// Friendly Portuguese label for a stored action; unknown actions pass through.
pub fn action_label(action: &str) -> &str {
    match action {
        "CREATE" => "Criou",
        "UPDATE" => "Atualizou",
        "DELETE" => "Deletou",
        "RESTORE" => "Restaurou",
        "LOGIN" => "Fez login",
        "LOGOUT" => "Fez logout",
        "LOGIN_FAILED" => "Tentativa de login falhou",
        "PASSWORD_CHANGE" => "Alterou senha",
        "EMAIL_CHANGE" => "Alterou email",
        "EXPORT" => "Exportou dados",
        "IMPORT" => "Importou dados",
        "BACKUP" => "Criou backup",
        "COMPLETE" => "Concluiu",
        "CANCEL" => "Cancelou",
        "CONFIRM" => "Confirmou",
        "REJECT" => "Recusou",
        other => other,
    }
}

pub fn resource_label(resource_type: &str) -> &str {
    match resource_type {
        "appointments" => "Agendamento",
        "clients" => "Cliente",
        "financial_records" => "Registro Financeiro",
        "services" => "Serviço",
        "team_members" => "Membro da Equipe",
        "profiles" => "Perfil",
        "categories" => "Categoria",
        "public_bookings" => "Agendamento Público",
        "users" => "Usuário",
        "queue_entries" => "Fila",
        other => other,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct RequestOrigin {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub user_id: Uuid,
    pub user_name: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub origin: RequestOrigin,
    pub metadata: Value,
}

impl NewAuditEntry {
    pub fn new(user_id: Uuid, action: AuditAction, resource_type: &str) -> Self {
        Self::custom(user_id, action.as_str(), resource_type)
    }

    /// Entry with a caller-defined action name.
    pub fn custom(user_id: Uuid, action: &str, resource_type: &str) -> Self {
        Self {
            user_id,
            user_name: None,
            action: action.to_uppercase(),
            resource_type: resource_type.to_string(),
            resource_id: None,
            old_values: None,
            new_values: None,
            origin: RequestOrigin::default(),
            metadata: Value::Object(Default::default()),
        }
    }

    pub fn resource(mut self, id: impl ToString) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }

    pub fn values(mut self, old: Option<Value>, new: Option<Value>) -> Self {
        self.old_values = old;
        self.new_values = new;
        self
    }

    pub fn user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    pub fn origin(mut self, origin: RequestOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct CreateAuditLogRequest {
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditLogFilters {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl AuditLogFilters {
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_AUDIT_LIMIT).clamp(1, MAX_AUDIT_LIMIT)
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldChange {
    pub field: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct AuditLogView {
    #[serde(flatten)]
    pub log: AuditLog,
    pub action_label: String,
    pub resource_label: String,
    pub changes: Vec<FieldChange>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecycleKind {
    Client,
    Service,
    TeamMember,
    Appointment,
}

impl RecycleKind {
    pub fn table(&self) -> &'static str {
        match self {
            RecycleKind::Client => "clients",
            RecycleKind::Service => "services",
            RecycleKind::TeamMember => "team_members",
            RecycleKind::Appointment => "appointments",
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DeletedItem {
    pub kind: String,
    pub id: Uuid,
    pub label: String,
    pub deleted_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RestoreRequest {
    pub kind: RecycleKind,
    pub id: Uuid,
}

/// Who performed a change, attached to every audited write.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    pub user_id: Uuid,
    pub user_name: Option<String>,
    pub origin: RequestOrigin,
}

impl AuditContext {
    pub fn entry(&self, action: AuditAction, resource_type: &str) -> NewAuditEntry {
        let mut entry = NewAuditEntry::new(self.user_id, action, resource_type).origin(self.origin.clone());
        entry.user_name = self.user_name.clone();
        entry
    }
}
