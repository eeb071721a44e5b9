//! Financial health evaluation behind the dashboard.
//!
//! Everything here is pure: the dashboard service gathers the aggregates and
//! these functions turn them into scores, labels and suggestions.

use crate::models::{
    round_cents, ActionItem, ActionKind, AgendaGap, AtRiskClient, DataMaturity, DoctorInputs,
    FinancialDoctorReport, FinancialInsight, GapKind, Impact, InsightCategory, Region,
};
use crate::utils::formatters::{format_currency, format_naive_date};

pub const MATURITY_BADGE_LIMIT: i64 = 75;
const MIN_APPOINTMENTS_FOR_METRICS: i64 = 5;
const MIN_DAYS_FOR_WEEKLY: i64 = 14;
const MAX_INSIGHTS: usize = 5;
const MAX_ACTION_ITEMS: usize = 5;

/// Last seven days against the seven before, as a whole percentage.
pub fn weekly_growth(current: f64, previous: f64) -> i64 {
    if previous <= 0.0 {
        return if current > 0.0 { 100 } else { 0 };
    }
    (((current - previous) / previous) * 100.0).round() as i64
}

/// How much history the account has, on a 0-100 scale.
///
/// Appointments count up to 40 points, account age up to 30, public
/// bookings 15 and this month's completed appointments up to 15.
pub fn maturity_score(
    appointments_total: i64,
    account_days_old: i64,
    has_public_bookings: bool,
    completed_this_month: i64,
) -> i64 {
    let appointments = appointments_total.clamp(0, 20) * 2;
    let age = account_days_old.clamp(0, 30);
    let public = if has_public_bookings { 15 } else { 0 };
    let volume = completed_this_month.clamp(0, 15);
    (appointments + age + public + volume).clamp(0, 100)
}

pub fn maturity_label(score: i64) -> &'static str {
    match score {
        s if s >= 75 => "Dados Maduros",
        s if s >= 50 => "Em Crescimento",
        s if s >= 25 => "Em Aprendizado",
        _ => "Início de Jornada",
    }
}

pub fn data_maturity(
    appointments_total: i64,
    account_days_old: i64,
    has_public_bookings: bool,
    completed_this_month: i64,
) -> DataMaturity {
    let score = maturity_score(
        appointments_total,
        account_days_old,
        has_public_bookings,
        completed_this_month,
    );

    let hint = if appointments_total < MIN_APPOINTMENTS_FOR_METRICS {
        format!(
            "{} agendamentos para desbloquear métricas avançadas.",
            MIN_APPOINTMENTS_FOR_METRICS - appointments_total
        )
    } else if account_days_old < MIN_DAYS_FOR_WEEKLY {
        format!(
            "{} dias para comparativos semanais.",
            MIN_DAYS_FOR_WEEKLY - account_days_old
        )
    } else {
        "Continue usando para refinar os insights.".to_string()
    };

    DataMaturity {
        appointments_total,
        account_days_old,
        has_public_bookings,
        completed_this_month,
        score,
        label: maturity_label(score).to_string(),
        show_badge: score < MATURITY_BADGE_LIMIT,
        hint,
    }
}

fn goal_progress(revenue: f64, goal: f64) -> f64 {
    if goal > 0.0 {
        revenue / goal * 100.0
    } else {
        0.0
    }
}

/// Health score from 0 to 100; zero while there is too little data.
pub fn health_score(inputs: &DoctorInputs) -> i64 {
    if inputs.maturity_score < 10 {
        return 0;
    }

    let mut score: i64 = 50;

    score += match inputs.weekly_growth {
        g if g > 10 => 20,
        g if g > 0 => 10,
        g if g < -10 => -20,
        g if g < 0 => -10,
        _ => 0,
    };

    score += match inputs.repeat_client_rate {
        r if r >= 50 => 15,
        r if r >= 25 => 8,
        r if r < 10 => -5,
        _ => 0,
    };

    score -= match inputs.churn_risk_count {
        c if c >= 5 => 15,
        c if c >= 2 => 8,
        _ => 0,
    };

    let progress = goal_progress(inputs.current_month_revenue, inputs.monthly_goal);
    score += if progress >= 100.0 {
        15
    } else if progress >= 70.0 {
        8
    } else if progress >= 50.0 {
        4
    } else if progress < 25.0 {
        -5
    } else {
        0
    };

    score += match inputs.completed_this_month {
        c if c >= 30 => 5,
        c if c >= 15 => 2,
        _ => 0,
    };

    score.clamp(0, 100)
}

pub fn health_label(score: i64, maturity_score: i64) -> &'static str {
    if maturity_score < 10 {
        return "Aguardando dados";
    }
    match score {
        s if s >= 80 => "Saúde Excelente",
        s if s >= 60 => "Saúde Boa",
        s if s >= 40 => "Atenção Necessária",
        _ => "Intervenção Urgente",
    }
}

/// Contextual insights, highest impact first, at most five.
pub fn insights(inputs: &DoctorInputs, region: Region) -> Vec<FinancialInsight> {
    let money = |v: f64| format_currency(Some(v), region, true);
    let progress = goal_progress(inputs.current_month_revenue, inputs.monthly_goal);
    let mut out = Vec::new();

    if inputs.churn_risk_count >= 2 && inputs.maturity_score >= 25 {
        out.push(FinancialInsight {
            id: "churn-risk",
            category: InsightCategory::Risk,
            title: format!("{} clientes sumidos", inputs.churn_risk_count),
            description: format!(
                "{} clientes frequentes não voltam há mais de 30 dias. Reconquistá-los custa 5x menos que captar novos.",
                inputs.churn_risk_count
            ),
            action: Some("Criar campanha de reativação no CRM".to_string()),
            impact: Impact::High,
            value: Some(format!("{} clientes", inputs.churn_risk_count)),
        });
    }

    if inputs.weekly_growth > 5 && inputs.account_days_old >= MIN_DAYS_FOR_WEEKLY {
        out.push(FinancialInsight {
            id: "growth-positive",
            category: InsightCategory::Achievement,
            title: format!("Crescendo {}% esta semana", inputs.weekly_growth),
            description: "Semana acima da média. Mantenha o calendário de marketing ativo para sustentar o ritmo."
                .to_string(),
            action: None,
            impact: Impact::Medium,
            value: Some(format!("+{}%", inputs.weekly_growth)),
        });
    } else if inputs.weekly_growth < -10 && inputs.account_days_old >= MIN_DAYS_FOR_WEEKLY {
        out.push(FinancialInsight {
            id: "growth-negative",
            category: InsightCategory::Risk,
            title: format!("Faturamento caiu {}%", inputs.weekly_growth.abs()),
            description: "Semana abaixo da anterior. Considere uma promoção relâmpago para preencher horários vazios."
                .to_string(),
            action: Some("Gerar conteúdo de oferta no Marketing".to_string()),
            impact: Impact::High,
            value: Some(format!("{}%", inputs.weekly_growth)),
        });
    }

    if progress >= 100.0 {
        out.push(FinancialInsight {
            id: "goal-achieved",
            category: InsightCategory::Achievement,
            title: "Meta do mês atingida! 🏆".to_string(),
            description: format!(
                "Você já gerou {}, superando sua meta de {}. Pense em aumentar a meta para o próximo mês.",
                money(inputs.current_month_revenue),
                money(inputs.monthly_goal)
            ),
            action: None,
            impact: Impact::High,
            value: Some(money(inputs.current_month_revenue)),
        });
    } else if progress >= 70.0 {
        out.push(FinancialInsight {
            id: "goal-close",
            category: InsightCategory::Opportunity,
            title: format!(
                "Faltam {} para a meta",
                money(round_cents(inputs.monthly_goal - inputs.current_month_revenue))
            ),
            description: format!(
                "Você está a {}% da meta. Alguns agendamentos extras esta semana já te colocam lá.",
                (100.0 - progress).round() as i64
            ),
            action: Some("Compartilhar link de agendamento".to_string()),
            impact: Impact::Medium,
            value: Some(format!("{}%", progress.round() as i64)),
        });
    } else if progress < 30.0 && inputs.account_days_old >= MIN_DAYS_FOR_WEEKLY {
        out.push(FinancialInsight {
            id: "goal-behind",
            category: InsightCategory::Risk,
            title: "Meta do mês em risco".to_string(),
            description: format!(
                "Apenas {}% da meta atingida. Uma campanha de reativação agora pode reverter o quadro antes do fechamento do mês.",
                progress.round() as i64
            ),
            action: Some("Ver clientes inativos no CRM".to_string()),
            impact: Impact::High,
            value: Some(format!("{}%", progress.round() as i64)),
        });
    }

    if inputs.repeat_client_rate < 20 && inputs.appointments_total >= 10 {
        out.push(FinancialInsight {
            id: "low-repeat-rate",
            category: InsightCategory::Opportunity,
            title: "Poucos clientes voltando".to_string(),
            description: format!(
                "Apenas {}% dos seus clientes retornam. A média saudável é 40%+. Campanhas de retenção podem dobrar essa taxa.",
                inputs.repeat_client_rate
            ),
            action: Some("Criar campanha de fidelidade".to_string()),
            impact: Impact::High,
            value: Some(format!("{}%", inputs.repeat_client_rate)),
        });
    } else if inputs.repeat_client_rate >= 50 {
        out.push(FinancialInsight {
            id: "high-repeat-rate",
            category: InsightCategory::Achievement,
            title: format!("{}% de fidelidade", inputs.repeat_client_rate),
            description: "Taxa de retorno excelente. Explore upselling de serviços premium.".to_string(),
            action: None,
            impact: Impact::Low,
            value: Some(format!("{}%", inputs.repeat_client_rate)),
        });
    }

    if inputs.avg_ticket > 0.0 && inputs.avg_ticket < 50.0 && inputs.appointments_total >= 10 {
        let top = inputs.top_service.clone().unwrap_or_default();
        out.push(FinancialInsight {
            id: "low-avg-ticket",
            category: InsightCategory::Opportunity,
            title: "Ticket médio pode crescer".to_string(),
            description: format!(
                "Seu ticket médio é {}. Adicionar serviços complementares ao pacote mais popular pode aumentar isso em 30%.",
                money(inputs.avg_ticket)
            ),
            action: Some(format!("Upsell no serviço \"{top}\"")),
            impact: Impact::Medium,
            value: Some(money(inputs.avg_ticket)),
        });
    }

    if inputs.campaigns_sent == 0 && inputs.appointments_total >= MIN_APPOINTMENTS_FOR_METRICS {
        out.push(FinancialInsight {
            id: "no-campaigns",
            category: InsightCategory::Opportunity,
            title: "IA ociosa por falta de campanhas".to_string(),
            description: "Clientes inativos podem ser reativados via WhatsApp, mas ainda nenhuma campanha foi enviada."
                .to_string(),
            action: Some("Ir para Marketing → Nova Campanha".to_string()),
            impact: Impact::High,
            value: None,
        });
    }

    if let Some(top) = inputs.top_service.as_ref().filter(|s| !s.is_empty()) {
        if inputs.completed_this_month >= 10 {
            out.push(FinancialInsight {
                id: "top-service",
                category: InsightCategory::Opportunity,
                title: format!("\"{top}\" em destaque"),
                description: "Seu serviço mais agendado este mês. Crie conteúdo específico para ele no Instagram."
                    .to_string(),
                action: Some("Gerar post no Marketing".to_string()),
                impact: Impact::Low,
                value: Some(top.clone()),
            });
        }
    }

    // Stable: equal impacts keep their insertion order.
    out.sort_by_key(|insight| insight.impact);
    out.truncate(MAX_INSIGHTS);
    out
}

pub fn report(inputs: &DoctorInputs, region: Region) -> FinancialDoctorReport {
    let score = health_score(inputs);
    FinancialDoctorReport {
        health_score: score,
        health_label: health_label(score, inputs.maturity_score).to_string(),
        has_data: inputs.maturity_score >= 10,
        repeat_client_rate: inputs.repeat_client_rate,
        churn_risk_count: inputs.churn_risk_count,
        avg_ticket: round_cents(inputs.avg_ticket),
        top_service: inputs.top_service.clone(),
        insights: insights(inputs, region),
    }
}

/// Recovery calls first, then light days, then one upsell, at most five.
pub fn action_items(
    at_risk: &[AtRiskClient],
    gaps: &[AgendaGap],
    top_service: Option<&str>,
    avg_ticket: f64,
    region: Region,
) -> Vec<ActionItem> {
    let mut items: Vec<ActionItem> = at_risk
        .iter()
        .take(2)
        .map(|client| ActionItem {
            kind: ActionKind::Recovery,
            title: format!("Reativar {}", client.name),
            description: format!(
                "{} visitas, sem voltar há {} dias.",
                client.total_visits, client.days_away
            ),
            client_id: Some(client.client_id),
            date: None,
            potential_revenue: Some(round_cents(client.avg_ticket)),
        })
        .collect();

    items.extend(gaps.iter().take(2).map(|gap| ActionItem {
        kind: ActionKind::Gap,
        title: match gap.kind {
            GapKind::Empty => format!("Agenda vazia em {}", format_naive_date(gap.date)),
            GapKind::Light => format!("Poucos horários em {}", format_naive_date(gap.date)),
        },
        description: format!(
            "{} agendamento(s). Compartilhe o link de agendamento ou envie uma oferta.",
            gap.appointments
        ),
        client_id: None,
        date: Some(gap.date),
        potential_revenue: (avg_ticket > 0.0).then(|| round_cents(avg_ticket)),
    }));

    if let Some(service) = top_service.filter(|s| !s.is_empty()) {
        items.push(ActionItem {
            kind: ActionKind::Upsell,
            title: format!("Complementar \"{service}\""),
            description: format!(
                "Ofereça um serviço adicional a quem agenda {service}. Ticket médio atual: {}.",
                format_currency(Some(avg_ticket), region, true)
            ),
            client_id: None,
            date: None,
            potential_revenue: None,
        });
    }

    items.truncate(MAX_ACTION_ITEMS);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn mature() -> DoctorInputs {
        DoctorInputs {
            maturity_score: 80,
            appointments_total: 120,
            account_days_old: 90,
            monthly_goal: 10_000.0,
            ..Default::default()
        }
    }

    #[test]
    fn growth_handles_empty_previous_week() {
        assert_eq!(weekly_growth(0.0, 0.0), 0);
        assert_eq!(weekly_growth(500.0, 0.0), 100);
        assert_eq!(weekly_growth(1500.0, 1000.0), 50);
        assert_eq!(weekly_growth(900.0, 1000.0), -10);
        assert_eq!(weekly_growth(1001.0, 3000.0), -67);
    }

    #[test]
    fn maturity_levels_and_hints() {
        let fresh = data_maturity(2, 3, false, 1);
        assert_eq!(fresh.score, 8);
        assert_eq!(fresh.label, "Início de Jornada");
        assert!(fresh.show_badge);
        assert_eq!(fresh.hint, "3 agendamentos para desbloquear métricas avançadas.");

        let learning = data_maturity(10, 5, false, 5);
        assert_eq!(learning.score, 30);
        assert_eq!(learning.label, "Em Aprendizado");
        assert_eq!(learning.hint, "9 dias para comparativos semanais.");

        let grown = data_maturity(50, 120, true, 40);
        assert_eq!(grown.score, 100);
        assert_eq!(grown.label, "Dados Maduros");
        assert!(!grown.show_badge);
    }

    #[test]
    fn health_score_waits_for_data() {
        let inputs = DoctorInputs {
            maturity_score: 5,
            weekly_growth: 50,
            ..Default::default()
        };
        assert_eq!(health_score(&inputs), 0);
        assert_eq!(health_label(0, 5), "Aguardando dados");
    }

    #[test]
    fn health_score_combines_signals() {
        let strong = DoctorInputs {
            weekly_growth: 15,
            repeat_client_rate: 55,
            current_month_revenue: 12_000.0,
            completed_this_month: 35,
            ..mature()
        };
        assert_eq!(health_score(&strong), 100);
        assert_eq!(health_label(100, 80), "Saúde Excelente");

        let weak = DoctorInputs {
            weekly_growth: -20,
            repeat_client_rate: 5,
            churn_risk_count: 6,
            current_month_revenue: 1_000.0,
            ..mature()
        };
        // 50 - 20 - 5 - 15 - 5
        assert_eq!(health_score(&weak), 5);
        assert_eq!(health_label(5, 80), "Intervenção Urgente");

        let middling = DoctorInputs {
            weekly_growth: 3,
            repeat_client_rate: 30,
            churn_risk_count: 2,
            current_month_revenue: 5_500.0,
            completed_this_month: 16,
            ..mature()
        };
        // 50 + 10 + 8 - 8 + 4 + 2
        assert_eq!(health_score(&middling), 66);
        assert_eq!(health_label(66, 80), "Saúde Boa");
    }

    #[test]
    fn insights_are_ordered_by_impact_and_capped() {
        let inputs = DoctorInputs {
            weekly_growth: 8,
            churn_risk_count: 4,
            repeat_client_rate: 60,
            avg_ticket: 40.0,
            top_service: Some("Corte".into()),
            completed_this_month: 12,
            current_month_revenue: 7_500.0,
            campaigns_sent: 0,
            ..mature()
        };
        let found = insights(&inputs, Region::Br);
        assert_eq!(found.len(), 5);
        let ids: Vec<&str> = found.iter().map(|i| i.id).collect();
        assert_eq!(
            ids,
            vec!["churn-risk", "no-campaigns", "growth-positive", "goal-close", "low-avg-ticket"]
        );
        assert!(found.windows(2).all(|w| w[0].impact <= w[1].impact));
        assert_eq!(found[3].title, "Faltam R$ 2.500,00 para a meta");
    }

    #[test]
    fn goal_achieved_uses_region_currency() {
        let inputs = DoctorInputs {
            current_month_revenue: 12_000.0,
            ..mature()
        };
        let found = insights(&inputs, Region::Pt);
        let goal = found.iter().find(|i| i.id == "goal-achieved").unwrap();
        assert_eq!(goal.value.as_deref(), Some("€ 12.000,00"));
    }

    #[test]
    fn action_items_prioritize_recovery() {
        let client = |name: &str| AtRiskClient {
            client_id: Uuid::new_v4(),
            name: name.to_string(),
            phone: None,
            total_visits: 6,
            last_visit: Utc::now(),
            avg_ticket: 55.0,
            days_away: 40,
        };
        let gap = |d: u32| AgendaGap {
            date: NaiveDate::from_ymd_opt(2024, 7, d).unwrap(),
            appointments: 0,
            kind: GapKind::Empty,
        };
        let at_risk = vec![client("Ana"), client("Bruno"), client("Caio")];
        let gaps = vec![gap(1), gap(2), gap(3)];

        let items = action_items(&at_risk, &gaps, Some("Corte"), 50.0, Region::Br);
        let kinds: Vec<ActionKind> = items.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ActionKind::Recovery,
                ActionKind::Recovery,
                ActionKind::Gap,
                ActionKind::Gap,
                ActionKind::Upsell
            ]
        );
        assert_eq!(items[0].title, "Reativar Ana");
        assert_eq!(items[2].title, "Agenda vazia em 01/07/2024");

        assert!(action_items(&[], &[], None, 0.0, Region::Br).is_empty());
    }
}
