//! WhatsApp copy: reactivation messages and booking confirmations.

use chrono::{DateTime, FixedOffset};
use uuid::Uuid;

use crate::models::BusinessType;
use crate::utils::formatters::{digits_only, format_date, format_time};

const DEFAULT_DAYS_MISSING: i64 = 30;

pub fn whatsapp_url(phone: &str, encoded_message: &str) -> String {
    format!("https://wa.me/{}?text={}", digits_only(phone), encoded_message)
}

fn first_name(full_name: &str) -> &str {
    full_name.split_whitespace().next().unwrap_or(full_name)
}

fn reactivation_templates(kind: BusinessType, name: &str, business: &str, days: i64) -> [String; 3] {
    match kind {
        BusinessType::Barber => [
            format!("Fala, {name}! Tudo tranquilo? Cara, notei que já faz uns {days} dias que você não passa aqui na {business}. A cadeira tá te esperando! Bora dar aquele talento? Reservo um horário pra você?"),
            format!("E aí {name}, beleza? O pessoal aqui da {business} sentiu sua falta. O cabelo já deve estar pedindo um corte, hein? 😂 Se quiser, te mando os horários disponíveis desta semana."),
            format!("Grande {name}! Saudade de trocar aquela ideia enquanto damos um tapa no visual. Vamos renovar esse estilo na {business}? Me avisa aqui se quiser que eu separe sua vaga."),
        ],
        BusinessType::Beauty => [
            format!("Olá, {name}! Tudo bem? Sentimos sua falta aqui no {business}. ✨ Já faz um tempinho desde sua última visita e queremos te convidar para um momento de autocuidado. Que tal agendarmos algo para esta semana?"),
            format!("Oi {name}, como você está? Notamos que seu último procedimento no {business} foi há mais de um mês. 🌸 Temos novidades e adoraríamos te receber de novo. Posso te enviar as disponibilidades?"),
            format!("Olá {name}! Passando para dizer que o {business} está com saudades de você. 😊 Que tal renovar sua autoestima hoje? Temos alguns horários especiais, quer dar uma olhadinha?"),
        ],
    }
}

/// Reactivation message for an inactive client. The template is picked from
/// the client id so the same client always gets the same wording.
pub fn reactivation_message(
    client_id: Uuid,
    client_name: &str,
    business_name: &str,
    kind: BusinessType,
    days_missing: Option<i64>,
) -> String {
    let days = days_missing.filter(|d| *d > 0).unwrap_or(DEFAULT_DAYS_MISSING);
    let templates = reactivation_templates(kind, first_name(client_name), business_name, days);
    let index = client_id.as_bytes()[15] as usize % templates.len();
    templates[index].clone()
}

/// Confirmation sent after the staff wizard books an appointment.
pub fn booking_confirmation(
    kind: BusinessType,
    client_name: &str,
    business_name: &str,
    start: &DateTime<FixedOffset>,
    services: &str,
) -> String {
    let date = format_date(start);
    let time = format_time(start);
    match kind {
        BusinessType::Beauty => format!(
            "Olá {client_name}! Tudo bem? ✨\n\
             Sua reserva na *{business_name}* está confirmada!\n\
             📅 *{date}* às *{time}*\n\
             💼 *Serviços*: {services}\n\
             📍 Local: estamos te esperando!\n\n\
             Estamos preparando tudo para te receber com a melhor experiência. Até logo! 💖"
        ),
        BusinessType::Barber => format!(
            "Fala, {client_name}! Seu horário está garantido! 🛡️\n\
             Marque na sua agenda:\n\
             🗓️ *{date}* às *{time}*\n\
             ✂️ *Serviço*: {services}\n\
             📍 Onde: *{business_name}*.\n\n\
             Prepare-se para o trato! Nos vemos em breve. 👋"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reactivation_uses_first_name_and_default_days() {
        let id = Uuid::from_bytes([0; 16]);
        let text = reactivation_message(id, "Carlos Silva", "Barbearia Top", BusinessType::Barber, None);
        assert!(text.starts_with("Fala, Carlos!"));
        assert!(text.contains("30 dias"));
        assert!(text.contains("Barbearia Top"));
        assert!(!text.contains("Silva"));
    }

    #[test]
    fn reactivation_is_stable_per_client() {
        let id = Uuid::new_v4();
        let a = reactivation_message(id, "Ana", "Studio", BusinessType::Beauty, Some(45));
        let b = reactivation_message(id, "Ana", "Studio", BusinessType::Beauty, Some(45));
        assert_eq!(a, b);
        assert!(a.contains("Ana"));
    }

    #[test]
    fn link_keeps_only_digits() {
        let encoded = urlencoding::encode("Olá Ana").into_owned();
        assert_eq!(
            whatsapp_url("+55 (11) 98765-4321", &encoded),
            "https://wa.me/5511987654321?text=Ol%C3%A1%20Ana"
        );
    }

    #[test]
    fn confirmation_wording_by_business_type() {
        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        let start = offset.with_ymd_and_hms(2024, 7, 1, 14, 30, 0).unwrap();

        let barber = booking_confirmation(BusinessType::Barber, "João", "Navalha", &start, "Corte");
        assert!(barber.contains("🗓️ *01/07/2024* às *14:30*"));
        assert!(barber.contains("Onde: *Navalha*"));

        let beauty = booking_confirmation(BusinessType::Beauty, "Ana", "Bella", &start, "Escova, Unha");
        assert!(beauty.contains("Sua reserva na *Bella* está confirmada!"));
        assert!(beauty.contains("Serviços*: Escova, Unha"));
    }
}
