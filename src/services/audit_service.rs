use chrono::{DateTime, FixedOffset, Utc};
use serde_json::Value;
use sqlx::PgPool;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    action_label, resource_label, AuditLog, AuditLogFilters, AuditLogView, FieldChange,
    NewAuditEntry,
};

const AUDIT_COLUMNS: &str = "id, user_id, user_name, action, resource_type, resource_id, \
     old_values, new_values, ip_address, user_agent, metadata, created_at";

#[derive(Clone)]
pub struct AuditService {
    db: PgPool,
}

impl AuditService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn record(&self, entry: NewAuditEntry) -> Result<AuditLog, AppError> {
        let log = sqlx::query_as::<_, AuditLog>(&format!(
            "INSERT INTO audit_logs (
                id, user_id, user_name, action, resource_type, resource_id,
                old_values, new_values, ip_address, user_agent, metadata
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {AUDIT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(entry.user_id)
        .bind(&entry.user_name)
        .bind(&entry.action)
        .bind(&entry.resource_type)
        .bind(&entry.resource_id)
        .bind(&entry.old_values)
        .bind(&entry.new_values)
        .bind(&entry.origin.ip_address)
        .bind(&entry.origin.user_agent)
        .bind(&entry.metadata)
        .fetch_one(&self.db)
        .await?;

        Ok(log)
    }

    /// Records an entry without failing the caller; audit problems only reach the logs.
    pub async fn record_quietly(&self, entry: NewAuditEntry) {
        let action = entry.action.clone();
        if let Err(err) = self.record(entry).await {
            tracing::warn!(error = %err, action = %action, "failed to write audit entry");
        }
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        filters: &AuditLogFilters,
    ) -> Result<Vec<AuditLogView>, AppError> {
        let logs = self.fetch(user_id, filters).await?;
        Ok(logs.into_iter().map(into_view).collect())
    }

    pub async fn export_csv(
        &self,
        user_id: Uuid,
        filters: &AuditLogFilters,
        offset: FixedOffset,
    ) -> Result<String, AppError> {
        let logs = self.fetch(user_id, filters).await?;
        logs_to_csv(&logs, offset)
    }

    async fn fetch(&self, user_id: Uuid, filters: &AuditLogFilters) -> Result<Vec<AuditLog>, AppError> {
        let mut query = format!("SELECT {AUDIT_COLUMNS} FROM audit_logs WHERE user_id = $1");
        let mut param_count = 2;

        if filters.action.is_some() {
            query.push_str(&format!(" AND action = ${param_count}"));
            param_count += 1;
        }
        if filters.resource_type.is_some() {
            query.push_str(&format!(" AND resource_type = ${param_count}"));
            param_count += 1;
        }
        if filters.start_date.is_some() {
            query.push_str(&format!(" AND created_at >= ${param_count}"));
            param_count += 1;
        }
        if filters.end_date.is_some() {
            query.push_str(&format!(" AND created_at <= ${param_count}"));
        }

        query.push_str(&format!(
            " ORDER BY created_at DESC LIMIT {} OFFSET {}",
            filters.effective_limit(),
            filters.effective_offset()
        ));

        let mut builder = sqlx::query_as::<_, AuditLog>(&query).bind(user_id);
        if let Some(action) = &filters.action {
            builder = builder.bind(action.to_uppercase());
        }
        if let Some(resource_type) = &filters.resource_type {
            builder = builder.bind(resource_type);
        }
        if let Some(start) = filters.start_date {
            builder = builder.bind(start);
        }
        if let Some(end) = filters.end_date {
            builder = builder.bind(end);
        }

        Ok(builder.fetch_all(&self.db).await?)
    }
}

fn into_view(log: AuditLog) -> AuditLogView {
    let changes = diff_values(log.old_values.as_ref(), log.new_values.as_ref());
    AuditLogView {
        action_label: action_label(&log.action).to_string(),
        resource_label: resource_label(&log.resource_type).to_string(),
        changes,
        log,
    }
}

/// Fields whose values differ between two JSON objects, in key order.
/// Both sides must be present; otherwise there is nothing to compare.
pub fn diff_values(old: Option<&Value>, new: Option<&Value>) -> Vec<FieldChange> {
    let (Some(Value::Object(old)), Some(Value::Object(new))) = (old, new) else {
        return Vec::new();
    };

    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    keys.into_iter()
        .filter(|key| old.get(*key) != new.get(*key))
        .map(|key| FieldChange {
            field: key.clone(),
            old: old.get(key).cloned(),
            new: new.get(key).cloned(),
        })
        .collect()
}

fn format_timestamp(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format("%d/%m/%Y %H:%M:%S").to_string()
}

pub fn logs_to_csv(logs: &[AuditLog], offset: FixedOffset) -> Result<String, AppError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer
        .write_record(["Data/Hora", "Usuário", "Ação", "Recurso", "ID do Recurso"])
        .map_err(anyhow::Error::from)?;
    for log in logs {
        writer
            .write_record([
                format_timestamp(log.created_at, offset).as_str(),
                log.user_name.as_deref().unwrap_or("Sistema"),
                action_label(&log.action),
                resource_label(&log.resource_type),
                log.resource_id.as_deref().unwrap_or("-"),
            ])
            .map_err(anyhow::Error::from)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to flush audit CSV: {err}"))?;
    Ok(String::from_utf8(bytes).map_err(anyhow::Error::from)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn log(action: &str, resource: &str) -> AuditLog {
        AuditLog {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            user_name: None,
            action: action.into(),
            resource_type: resource.into(),
            resource_id: None,
            old_values: None,
            new_values: None,
            ip_address: None,
            user_agent: None,
            metadata: json!({}),
            created_at: Utc.with_ymd_and_hms(2024, 3, 5, 17, 7, 9).unwrap(),
        }
    }

    #[test]
    fn diff_lists_changed_fields_only() {
        let old = json!({"price": 40.0, "notes": "a", "status": "Confirmed"});
        let new = json!({"price": 50.0, "notes": "a", "payment_method": "pix"});

        let changes = diff_values(Some(&old), Some(&new));
        let fields: Vec<&str> = changes.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["payment_method", "price", "status"]);
        assert_eq!(changes[1].old, Some(json!(40.0)));
        assert_eq!(changes[2].new, None);
    }

    #[test]
    fn diff_needs_both_sides() {
        assert!(diff_values(None, Some(&json!({"a": 1}))).is_empty());
        assert!(diff_values(Some(&json!({"a": 1})), None).is_empty());
    }

    #[test]
    fn csv_export_uses_labels_and_defaults() {
        let mut named = log("UPDATE", "clients");
        named.user_name = Some("Maria \"Mari\"".into());
        named.resource_id = Some("abc".into());

        let csv = logs_to_csv(
            &[log("LOGIN", "users"), named],
            FixedOffset::west_opt(3 * 3600).unwrap(),
        )
        .unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "Data/Hora,Usuário,Ação,Recurso,ID do Recurso");
        assert_eq!(lines[1], "05/03/2024 14:07:09,Sistema,Fez login,Usuário,-");
        assert_eq!(
            lines[2],
            "05/03/2024 14:07:09,\"Maria \"\"Mari\"\"\",Atualizou,Cliente,abc"
        );
        assert_eq!(lines.len(), 3);
    }
}
