use std::sync::Arc;

use base64::Engine;
use chrono::{Datelike, Utc};
use serde::de::DeserializeOwned;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    AnalyzePhotoRequest, BusinessType, CalendarDay, CampaignSignals, CampaignSuggestion,
    PhotoAnalysis, SocialContent, SocialContentRequest,
};
use crate::services::business_service::BusinessService;
use crate::services::gemini_client::{
    parse_model_json, strip_data_url, ContentGenerator, GeminiError, GenerationRequest,
};
use crate::utils::dates::local_date;

/// Days without an appointment after which a client counts as inactive.
pub const INACTIVE_DAYS: i32 = 60;
const WEEKDAY_SHORT: [&str; 7] = ["Dom", "Seg", "Ter", "Qua", "Qui", "Sex", "Sáb"];

fn business_kind_pt(kind: BusinessType) -> &'static str {
    match kind {
        BusinessType::Barber => "barbearia",
        BusinessType::Beauty => "salão de beleza",
    }
}

/// The two weekdays with most appointments; `counts` is indexed from Sunday.
pub fn busiest_days(counts: &[i64; 7]) -> Vec<String> {
    let mut days: Vec<(usize, i64)> = counts.iter().copied().enumerate().filter(|(_, n)| *n > 0).collect();
    days.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    days.into_iter().take(2).map(|(i, _)| WEEKDAY_SHORT[i].to_string()).collect()
}

pub fn photo_prompt() -> String {
    r#"Analise esta foto de corte de cabelo ou salão de beleza e sugira edições profissionais para redes sociais.

Considere:
1. Qualidade (iluminação, nitidez, correção de cor)
2. Opções de fundo (desfocar, remover, trocar por fundo profissional)
3. Retoques profissionais
4. Composição

Responda APENAS com JSON válido neste formato:
{
  "suggestions": ["sugestão 1", "sugestão 2", "sugestão 3"],
  "background_options": ["opção 1", "opção 2"],
  "quality_score": 7.5,
  "recommended_edits": ["edição 1", "edição 2"]
}"#
    .to_string()
}

pub fn social_prompt(business_name: &str, kind: BusinessType, description: &str, custom: Option<&str>) -> String {
    let extra = custom
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| format!("Pedido adicional: {c}\n"))
        .unwrap_or_default();
    format!(
        r#"Crie um post de Instagram para {business_name}, uma {kind}.

Descrição da imagem: {description}
{extra}
O conteúdo deve ser em português do Brasil e ter:
- legenda envolvente e profissional (2-3 frases)
- 10 a 15 hashtags relevantes
- uma chamada para ação clara

Responda APENAS com JSON válido neste formato:
{{
  "caption": "legenda",
  "hashtags": ["hashtag1", "hashtag2"],
  "cta": "chamada para ação"
}}"#,
        kind = business_kind_pt(kind),
    )
}

pub fn calendar_prompt(business_name: &str, kind: BusinessType) -> String {
    format!(
        r#"Crie um calendário de conteúdo de 7 dias (segunda a domingo) para o Instagram de {business_name}, uma {kind}.

Para cada dia informe:
- content_type: "carousel", "reel", "story" ou "post"
- topic: tema curto
- caption: legenda em português (2-3 frases)
- hashtags: 8 a 12 hashtags
- posting_time: melhor horário no formato "HH:MM"

Varie os formatos e misture dicas, antes e depois, bastidores, depoimentos e promoções.

Responda APENAS com um array JSON de 7 objetos neste formato:
[
  {{
    "day": "Segunda-feira",
    "content_type": "post",
    "topic": "tema",
    "caption": "legenda",
    "hashtags": ["hashtag1", "hashtag2"],
    "posting_time": "10:00"
  }}
]"#,
        kind = business_kind_pt(kind),
    )
}

pub fn campaign_prompt(business_name: &str, kind: BusinessType, signals: &CampaignSignals) -> String {
    let busiest = if signals.busiest_days.is_empty() {
        "sem dados".to_string()
    } else {
        signals.busiest_days.join(", ")
    };
    format!(
        r#"Analise os dados desta {kind} e sugira de 3 a 5 campanhas de marketing.

Negócio: {business_name}
Dados:
- Total de clientes: {total}
- Aniversariantes do mês: {birthdays}
- Clientes inativos ({days}+ dias): {inactive}
- Dias mais movimentados: {busiest}

Sugira campanhas de aniversário, reativação de inativos, promoções para dias fracos, preço premium nos dias de pico e oportunidades sazonais.

Para cada campanha informe name, type ("birthday", "reactivation", "promotion", "premium" ou "seasonal"), target_audience, objective, timing, expected_impact e message (em português).

Responda APENAS com um array JSON de 3 a 5 objetos neste formato:
[
  {{
    "name": "nome",
    "type": "birthday",
    "target_audience": "público",
    "objective": "objetivo",
    "timing": "quando",
    "expected_impact": "resultado esperado",
    "message": "mensagem"
  }}
]"#,
        kind = business_kind_pt(kind),
        total = signals.total_clients,
        birthdays = signals.birthdays_this_month,
        days = INACTIVE_DAYS,
        inactive = signals.inactive_clients,
    )
}

/// Sends a prompt and parses the JSON reply.
pub async fn ask<T: DeserializeOwned>(
    generator: &dyn ContentGenerator,
    request: GenerationRequest,
) -> Result<T, AppError> {
    let text = generator.generate(request).await?;
    let parsed = parse_model_json(&text).map_err(|err| {
        tracing::warn!(error = %err, "model reply could not be parsed");
        err
    })?;
    Ok(parsed)
}

/// AI-assisted marketing content.
#[derive(Clone)]
pub struct MarketingService {
    db: PgPool,
    business: BusinessService,
    generator: Arc<dyn ContentGenerator>,
}

impl MarketingService {
    pub fn new(db: PgPool, generator: Arc<dyn ContentGenerator>) -> Self {
        Self {
            business: BusinessService::new(db.clone()),
            db,
            generator,
        }
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn analyze_photo(&self, business_id: Uuid, request: AnalyzePhotoRequest) -> Result<PhotoAnalysis, AppError> {
        let data = strip_data_url(request.image_base64.trim());
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|_| AppError::validation("image_base64: invalid base64 image"))?;

        ask(self.generator.as_ref(), GenerationRequest::with_image(photo_prompt(), data)).await
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn social_content(&self, business_id: Uuid, request: SocialContentRequest) -> Result<SocialContent, AppError> {
        let profile = self.business.get_profile(business_id).await?;
        let prompt = social_prompt(
            &profile.business_name,
            profile.kind(),
            request.image_description.trim(),
            request.custom_request.as_deref(),
        );
        ask(self.generator.as_ref(), GenerationRequest::text(prompt)).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn content_calendar(&self, business_id: Uuid) -> Result<Vec<CalendarDay>, AppError> {
        let profile = self.business.get_profile(business_id).await?;
        let days: Vec<CalendarDay> = ask(
            self.generator.as_ref(),
            GenerationRequest::text(calendar_prompt(&profile.business_name, profile.kind())),
        )
        .await?;
        if days.is_empty() {
            return Err(GeminiError::MalformedOutput("empty content calendar".to_string()).into());
        }
        Ok(days)
    }

    pub async fn campaign_signals(&self, business_id: Uuid) -> Result<CampaignSignals, AppError> {
        let profile = self.business.get_profile(business_id).await?;
        let offset = profile.region().offset();
        let month = local_date(Utc::now(), offset).month() as i32;

        let (total_clients, birthdays_this_month, inactive_clients): (i64, i64, i64) = sqlx::query_as(
            "SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE EXTRACT(MONTH FROM c.birth_date)::int = $2),
                COUNT(*) FILTER (WHERE NOT EXISTS (
                    SELECT 1 FROM appointments a
                    WHERE a.client_id = c.id AND a.deleted_at IS NULL
                      AND a.appointment_time > NOW() - make_interval(days => $3)
                ))
             FROM clients c
             WHERE c.user_id = $1 AND c.deleted_at IS NULL",
        )
        .bind(business_id)
        .bind(month)
        .bind(INACTIVE_DAYS)
        .fetch_one(&self.db)
        .await?;

        let by_weekday: Vec<(i32, i64)> = sqlx::query_as(
            "SELECT EXTRACT(DOW FROM (appointment_time AT TIME ZONE 'UTC') + make_interval(secs => $2))::int AS dow,
                    COUNT(*)
             FROM appointments
             WHERE user_id = $1 AND deleted_at IS NULL
             GROUP BY dow",
        )
        .bind(business_id)
        .bind(offset.local_minus_utc() as f64)
        .fetch_all(&self.db)
        .await?;

        let mut counts = [0i64; 7];
        for (dow, count) in by_weekday {
            if let Some(slot) = counts.get_mut(dow as usize) {
                *slot = count;
            }
        }

        Ok(CampaignSignals {
            total_clients,
            birthdays_this_month,
            inactive_clients,
            busiest_days: busiest_days(&counts),
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn campaign_opportunities(&self, business_id: Uuid) -> Result<Vec<CampaignSuggestion>, AppError> {
        let profile = self.business.get_profile(business_id).await?;
        let signals = self.campaign_signals(business_id).await?;
        ask(
            self.generator.as_ref(),
            GenerationRequest::text(campaign_prompt(&profile.business_name, profile.kind(), &signals)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CampaignKind;
    use crate::services::gemini_client::MockContentGenerator;
    use pretty_assertions::assert_eq;

    #[test]
    fn busiest_days_pick_top_two() {
        assert_eq!(busiest_days(&[0, 3, 9, 1, 9, 12, 4]), vec!["Sex", "Ter"]);
        assert_eq!(busiest_days(&[0, 0, 0, 0, 0, 0, 2]), vec!["Sáb"]);
        assert!(busiest_days(&[0; 7]).is_empty());
    }

    #[test]
    fn prompts_carry_business_context() {
        let prompt = social_prompt("Barbearia do Zé", BusinessType::Barber, "degradê navalhado", Some("  "));
        assert!(prompt.contains("Barbearia do Zé, uma barbearia"));
        assert!(prompt.contains("degradê navalhado"));
        assert!(!prompt.contains("Pedido adicional"));

        let signals = CampaignSignals {
            total_clients: 120,
            birthdays_this_month: 7,
            inactive_clients: 31,
            busiest_days: vec!["Sex".into(), "Sáb".into()],
        };
        let prompt = campaign_prompt("Studio Bella", BusinessType::Beauty, &signals);
        assert!(prompt.contains("salão de beleza"));
        assert!(prompt.contains("Clientes inativos (60+ dias): 31"));
        assert!(prompt.contains("Dias mais movimentados: Sex, Sáb"));
    }

    #[tokio::test]
    async fn ask_parses_fenced_reply() {
        let mut generator = MockContentGenerator::new();
        generator
            .expect_generate()
            .withf(|req| req.image_base64.is_none())
            .times(1)
            .returning(|_| {
                Ok(r#"```json
[{"name":"Volta por cima","type":"reactivation","target_audience":"Inativos","objective":"Reativar",
  "timing":"Esta semana","expected_impact":"10 retornos","message":"Sentimos sua falta!"}]
```"#
                    .to_string())
            });

        let campaigns: Vec<CampaignSuggestion> = ask(&generator, GenerationRequest::text("x")).await.unwrap();
        assert_eq!(campaigns.len(), 1);
        assert_eq!(campaigns[0].kind, CampaignKind::Reactivation);
    }

    #[tokio::test]
    async fn ask_maps_errors() {
        let mut generator = MockContentGenerator::new();
        generator
            .expect_generate()
            .returning(|_| Ok("Desculpe, não consigo.".to_string()));
        let err = ask::<SocialContent>(&generator, GenerationRequest::text("x")).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_GATEWAY);

        let mut generator = MockContentGenerator::new();
        generator
            .expect_generate()
            .returning(|_| Err(GeminiError::MissingApiKey));
        let err = ask::<SocialContent>(&generator, GenerationRequest::text("x")).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code(), "AI_UNAVAILABLE");
    }
}
