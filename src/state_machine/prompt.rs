//! Outbound prompts
//!
//! Text is HTML (Telegram parse mode). Every value that came from a user or
//! the store goes through [`escape`].

use super::event::{AdminAction, Button};
use super::state::TargetAction;
use crate::access::{AdminRole, ParticipantId};
use crate::catalog::{CatalogKind, CatalogOutcome};
use crate::store::{BookingRecord, BookingStats, BookingStatus, RecordField, RecordId};
use crate::validation::format_date;
use chrono::{Days, NaiveDate};
use std::fmt::Write;

/// A message to show the participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    pub markup: Markup,
}

/// Keyboard attached to a prompt
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Markup {
    #[default]
    None,
    /// Inline buttons, one inner vec per row
    Buttons(Vec<Vec<Choice>>),
    /// One-time reply keyboard with canned answers
    Suggestions(Vec<Vec<String>>),
    /// Hide a reply keyboard left over from an earlier prompt
    RemoveSuggestions,
}

/// Labelled inline button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub button: Button,
}

impl Choice {
    pub fn new(label: impl Into<String>, button: Button) -> Self {
        Self {
            label: label.into(),
            button,
        }
    }
}

impl Prompt {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: Markup::None,
        }
    }

    pub fn with_buttons(mut self, rows: Vec<Vec<Choice>>) -> Self {
        self.markup = Markup::Buttons(rows);
        self
    }

    pub fn with_suggestions(mut self, rows: Vec<Vec<String>>) -> Self {
        self.markup = Markup::Suggestions(rows);
        self
    }

    pub fn removing_suggestions(mut self) -> Self {
        self.markup = Markup::RemoveSuggestions;
        self
    }

    /// Every button in the markup, row by row
    #[cfg(test)]
    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        let rows: &[Vec<Choice>] = match &self.markup {
            Markup::Buttons(rows) => rows,
            _ => &[],
        };
        rows.iter().flatten().map(|choice| &choice.button)
    }
}

/// Escape text for HTML parse mode
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn one_per_row(items: &[String]) -> Vec<Vec<String>> {
    items.iter().map(|item| vec![item.clone()]).collect()
}

fn two_per_row(items: &[String]) -> Vec<Vec<String>> {
    items.chunks(2).map(<[String]>::to_vec).collect()
}

fn status_label(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Pending => "⏳ pendente",
        BookingStatus::Confirmed => "✅ confirmado",
        BookingStatus::Cancelled => "❌ cancelado",
    }
}

// ============================================================================
// Visitor flow
// ============================================================================

pub fn visitor_menu(studio: &str) -> Prompt {
    Prompt::text(format!(
        "🌸 Olá! Bem-vinda ao <b>{}</b>! 💅\n\n\
         Fico feliz em te receber por aqui. ✨\n\
         Como posso te ajudar hoje?",
        escape(studio)
    ))
    .with_buttons(vec![
        vec![Choice::new("📅 Agendar horário", Button::Book)],
        vec![Choice::new("🕐 Ver horários disponíveis", Button::ListTimes)],
    ])
}

pub fn time_listing(studio: &str, slots: &[String]) -> Prompt {
    if slots.is_empty() {
        return Prompt::text(format!(
            "⏰ No momento não há horários disponíveis no <b>{}</b>.",
            escape(studio)
        ));
    }
    let listed: Vec<String> = slots.iter().map(|s| format!("🕐 {}", escape(s))).collect();
    Prompt::text(format!(
        "⏰ <b>Horários disponíveis no {}:</b>\n\n{}\n\n\
         Para agendar, use /start e escolha <b>Agendar horário</b>. 🌸",
        escape(studio),
        listed.join("\n")
    ))
}

pub fn ask_name(studio: &str) -> Prompt {
    Prompt::text(format!(
        "Ótimo! Vamos fazer seu agendamento no <b>{}</b>. 📋🌸\n\n\
         Por favor, me diga seu <b>nome completo</b>:",
        escape(studio)
    ))
}

pub fn name_rejected() -> Prompt {
    Prompt::text("❌ Nome muito curto. Por favor, informe seu nome completo:")
}

pub fn ask_service(name: &str, services: &[String]) -> Prompt {
    Prompt::text(format!(
        "Prazer, <b>{}</b>! 😊\n\nQual serviço você deseja?",
        escape(name)
    ))
    .with_suggestions(one_per_row(services))
}

pub fn service_rejected(services: &[String]) -> Prompt {
    Prompt::text("❌ Serviço inválido. Por favor, escolha uma das opções:")
        .with_suggestions(one_per_row(services))
}

fn date_example(today: NaiveDate) -> String {
    format_date(today.checked_add_days(Days::new(7)).unwrap_or(today))
}

pub fn ask_date(service: &str, today: NaiveDate) -> Prompt {
    Prompt::text(format!(
        "<b>{}</b> selecionado! ✅\n\n\
         Agora, me informe a <b>data</b> desejada no formato <b>DD/MM/AAAA</b> (ex: {}):",
        escape(service),
        date_example(today)
    ))
    .removing_suggestions()
}

pub fn date_rejected(today: NaiveDate) -> Prompt {
    Prompt::text(format!(
        "❌ Data inválida ou passada.\n\
         Informe uma data futura no formato <b>DD/MM/AAAA</b> (ex: {}):",
        date_example(today)
    ))
}

pub fn ask_time(date: NaiveDate, slots: &[String]) -> Prompt {
    if slots.is_empty() {
        return Prompt::text(format!(
            "📅 Data: <b>{}</b>\n\n\
             No momento não há horários disponíveis. Use /cancelar e tente mais tarde.",
            format_date(date)
        ));
    }
    Prompt::text(format!(
        "📅 Data: <b>{}</b>\n\nEscolha o <b>horário</b> desejado:",
        format_date(date)
    ))
    .with_suggestions(two_per_row(slots))
}

pub fn time_rejected(slots: &[String]) -> Prompt {
    Prompt::text("❌ Horário inválido. Escolha um dos horários disponíveis:")
        .with_suggestions(two_per_row(slots))
}

pub fn saving() -> Prompt {
    Prompt::text("⏳ Salvando seu agendamento...").removing_suggestions()
}

pub fn booking_confirmed(record: &BookingRecord, studio: &str) -> Prompt {
    Prompt::text(format!(
        "✅ <b>Agendamento recebido!</b>\n\n\
         👤 <b>Nome:</b> {}\n\
         💅 <b>Serviço:</b> {}\n\
         📅 <b>Data:</b> {}\n\
         🕐 <b>Horário:</b> {}\n\n\
         🌸 Te esperamos no <b>{}</b>!\n\
         Você receberá uma mensagem assim que o horário for confirmado. 💖",
        escape(&record.name),
        escape(&record.service),
        escape(&record.date),
        escape(&record.time),
        escape(studio)
    ))
}

pub fn booking_failed() -> Prompt {
    Prompt::text(
        "❌ Ops! Ocorreu um erro ao salvar seu agendamento.\n\
         Por favor, tente novamente com /start ou entre em contato conosco.",
    )
}

pub fn cancelled() -> Prompt {
    Prompt::text("❌ Operação cancelada. Use /start para recomeçar.").removing_suggestions()
}

pub fn not_understood() -> Prompt {
    Prompt::text("🤔 Não entendi. Use /start para agendar ou /cancelar para recomeçar.")
}

pub fn busy() -> Prompt {
    Prompt::text("⏳ Só um instante, ainda estou processando sua última solicitação.")
}

/// Alert sent to the owner when a visitor books
pub fn new_booking_alert(record: &BookingRecord) -> Prompt {
    Prompt::text(format!(
        "🔔 <b>Novo agendamento</b>\n\n{}\n\nUse /admin para confirmar.",
        record_summary(record)
    ))
}

/// Sent to the visitor after an admin confirms or cancels their booking
pub fn status_changed(record: &BookingRecord, studio: &str) -> Prompt {
    let headline = match record.status {
        BookingStatus::Confirmed => "✅ Seu agendamento foi <b>confirmado</b>!",
        BookingStatus::Cancelled => "❌ Seu agendamento foi <b>cancelado</b>.",
        BookingStatus::Pending => "⏳ Seu agendamento está <b>pendente</b>.",
    };
    Prompt::text(format!(
        "{headline}\n\n💅 {} em {} às {}\n\n🌸 {}",
        escape(&record.service),
        escape(&record.date),
        escape(&record.time),
        escape(studio)
    ))
}

// ============================================================================
// Administrative flow
// ============================================================================

pub fn access_denied() -> Prompt {
    Prompt::text("🚫 Acesso negado.").removing_suggestions()
}

pub fn admin_menu(role: AdminRole, result: Option<&str>) -> Prompt {
    let title = match role {
        AdminRole::Owner => "🛠 <b>Painel da proprietária</b>",
        AdminRole::TechAdmin => "🛠 <b>Painel técnico</b>",
    };
    let text = match result {
        Some(line) => format!("{line}\n\n{title}"),
        None => title.to_string(),
    };
    let rows = AdminAction::menu_for(role)
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|action| Choice::new(action.label(), Button::Admin(*action)))
                .collect()
        })
        .collect();
    Prompt::text(text).with_buttons(rows)
}

fn record_summary(record: &BookingRecord) -> String {
    format!(
        "👤 {}\n💅 {}\n📅 {} às {}\n{}",
        escape(&record.name),
        escape(&record.service),
        escape(&record.date),
        escape(&record.time),
        status_label(record.status)
    )
}

/// Telegram's limit on message text, in UTF-16 code units
const MAX_MESSAGE_UNITS: usize = 4096;
/// Room kept free for the "more records" footer
const FOOTER_UNITS: usize = 64;
/// Longest name or service shown on a listing line
const MAX_LINE_FIELD_CHARS: usize = 40;

fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max_chars - 1).collect();
    clipped.push('…');
    clipped
}

fn record_line(record: &BookingRecord) -> String {
    format!(
        "<code>{}</code> {} · {} · {} {} · {}",
        escape(&record.id.short()),
        escape(&clip(&record.name, MAX_LINE_FIELD_CHARS)),
        escape(&clip(&record.service, MAX_LINE_FIELD_CHARS)),
        escape(&record.date),
        escape(&record.time),
        status_label(record.status)
    )
}

pub fn listing(title: &str, records: &[BookingRecord]) -> Prompt {
    if records.is_empty() {
        return Prompt::text(format!("<b>{title}</b>\n\nNenhum agendamento encontrado."));
    }
    let mut text = format!("<b>{title}</b> ({})\n", records.len());
    let mut used = utf16_len(&text);
    for (shown, record) in records.iter().enumerate() {
        let line = format!("\n{}", record_line(record));
        let line_units = utf16_len(&line);
        if used + line_units + FOOTER_UNITS > MAX_MESSAGE_UNITS {
            let _ = write!(
                text,
                "\n\n… e mais {} agendamento(s) não exibidos.",
                records.len() - shown
            );
            break;
        }
        text.push_str(&line);
        used += line_units;
    }
    Prompt::text(text)
}

pub fn today_title(today: NaiveDate) -> String {
    format!("📅 Agendamentos de {}", format_date(today))
}

pub const ALL_TITLE: &str = "📋 Agendamentos";

fn target_verb(action: TargetAction) -> &'static str {
    match action {
        TargetAction::Confirm => "confirmar",
        TargetAction::Cancel => "cancelar",
        TargetAction::Delete => "excluir",
    }
}

pub fn target_choice(action: TargetAction, records: &[BookingRecord]) -> Prompt {
    let rows = records
        .iter()
        .map(|record| {
            vec![Choice::new(
                format!(
                    "{} · {} {} · {}",
                    record.name, record.date, record.time, record.service
                ),
                Button::Target {
                    action,
                    record_id: record.id.clone(),
                },
            )]
        })
        .collect();
    Prompt::text(format!(
        "Escolha o agendamento para <b>{}</b> (/cancelar para voltar):",
        target_verb(action)
    ))
    .with_buttons(rows)
}

pub fn nothing_to_select(action: TargetAction) -> String {
    format!("ℹ️ Nenhum agendamento disponível para {}.", target_verb(action))
}

pub fn record_not_found(record_id: &RecordId) -> String {
    format!(
        "⚠️ Agendamento <code>{}</code> não encontrado.",
        escape(&record_id.short())
    )
}

pub fn illegal_status_move(record: &BookingRecord, next: BookingStatus) -> String {
    format!(
        "⚠️ O agendamento de {} está {} e não pode ser marcado como {}.",
        escape(&record.name),
        status_label(record.status),
        status_label(next)
    )
}

pub fn target_applied(action: TargetAction, record: &BookingRecord) -> String {
    let done = match action {
        TargetAction::Confirm => "✅ Agendamento confirmado",
        TargetAction::Cancel => "❌ Agendamento cancelado",
        TargetAction::Delete => "🗑 Agendamento excluído",
    };
    format!(
        "{done}: {} · {} {}",
        escape(&record.name),
        escape(&record.date),
        escape(&record.time)
    )
}

pub fn deleted(record_id: &RecordId) -> String {
    format!(
        "🗑 Agendamento <code>{}</code> excluído.",
        escape(&record_id.short())
    )
}

pub fn store_failure_line() -> &'static str {
    "⚠️ Não foi possível acessar os agendamentos agora. Tente novamente em instantes."
}

pub fn ask_record_id() -> Prompt {
    Prompt::text(
        "✏️ Informe o <b>código</b> do agendamento (os primeiros caracteres bastam) \
         ou /cancelar para voltar:",
    )
}

pub fn record_id_not_found(prefix: &str) -> Prompt {
    Prompt::text(format!(
        "⚠️ Nenhum agendamento com código <code>{}</code>. Tente outro código ou /cancelar:",
        escape(prefix)
    ))
}

fn field_label(field: RecordField) -> &'static str {
    match field {
        RecordField::Name => "Nome",
        RecordField::Service => "Serviço",
        RecordField::Date => "Data",
        RecordField::Time => "Horário",
        RecordField::Status => "Status",
    }
}

pub fn field_choice(record: &BookingRecord) -> Prompt {
    let rows = RecordField::ALL
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|field| Choice::new(field_label(*field), Button::Field(*field)))
                .collect()
        })
        .collect();
    Prompt::text(format!(
        "<code>{}</code>\n{}\n\nQual campo deseja alterar?",
        escape(record.id.as_str()),
        record_summary(record)
    ))
    .with_buttons(rows)
}

pub fn ask_new_value(field: RecordField) -> Prompt {
    let hint = match field {
        RecordField::Status => " (pending, confirmed ou cancelled)",
        RecordField::Date => " (DD/MM/AAAA)",
        RecordField::Time => " (HH:MM)",
        RecordField::Name | RecordField::Service => "",
    };
    Prompt::text(format!(
        "Digite o novo valor para <b>{}</b>{hint}:",
        field_label(field)
    ))
}

pub fn empty_value_rejected() -> Prompt {
    Prompt::text("❌ O valor não pode ficar vazio. Digite novamente ou /cancelar:")
}

pub fn status_value_rejected() -> Prompt {
    Prompt::text("❌ Status desconhecido. Use pending, confirmed ou cancelled:")
}

pub fn field_updated(record: &BookingRecord, field: RecordField) -> String {
    format!(
        "✏️ {} atualizado.\n{}",
        field_label(field),
        record_summary(record)
    )
}

fn kind_label(kind: CatalogKind) -> &'static str {
    match kind {
        CatalogKind::Service => "serviço",
        CatalogKind::TimeSlot => "horário",
    }
}

pub fn ask_catalog_entry(kind: CatalogKind) -> Prompt {
    let text = match kind {
        CatalogKind::Service => "➕ Digite o nome do novo serviço:",
        CatalogKind::TimeSlot => "➕ Digite o novo horário no formato <b>HH:MM</b>:",
    };
    Prompt::text(text)
}

pub fn catalog_removal_choice(kind: CatalogKind, entries: &[String]) -> Prompt {
    let rows = entries
        .iter()
        .map(|entry| {
            vec![Choice::new(
                entry.clone(),
                Button::RemoveEntry {
                    kind,
                    value: entry.clone(),
                },
            )]
        })
        .collect();
    Prompt::text(format!("➖ Qual {} deseja remover?", kind_label(kind))).with_buttons(rows)
}

pub fn catalog_empty(kind: CatalogKind) -> String {
    format!("ℹ️ Não há {} cadastrado para remover.", kind_label(kind))
}

pub fn catalog_outcome(outcome: &CatalogOutcome) -> String {
    match outcome {
        CatalogOutcome::Added { kind, value } => {
            format!("✅ {} <b>{}</b> adicionado.", capitalized(kind), escape(value))
        }
        CatalogOutcome::Removed { kind, value } => {
            format!("➖ {} <b>{}</b> removido.", capitalized(kind), escape(value))
        }
        CatalogOutcome::AlreadyPresent { kind, value } => format!(
            "⚠️ O {} <b>{}</b> já existe.",
            kind_label(*kind),
            escape(value)
        ),
        CatalogOutcome::NotPresent { kind, value } => format!(
            "⚠️ O {} <b>{}</b> não está cadastrado.",
            kind_label(*kind),
            escape(value)
        ),
        CatalogOutcome::Rejected { kind, value } => match kind {
            CatalogKind::Service => "❌ Nome de serviço vazio.".to_string(),
            CatalogKind::TimeSlot => format!(
                "❌ Horário <b>{}</b> inválido. Use o formato HH:MM.",
                escape(value)
            ),
        },
    }
}

fn capitalized(kind: &CatalogKind) -> &'static str {
    match kind {
        CatalogKind::Service => "Serviço",
        CatalogKind::TimeSlot => "Horário",
    }
}

pub fn stats(stats: &BookingStats, today: NaiveDate) -> String {
    format!(
        "📊 <b>Estatísticas</b>\n\
         ⏳ Pendentes: {}\n\
         ✅ Confirmados: {}\n\
         ❌ Cancelados: {}\n\
         Σ Total: {}\n\
         📅 Hoje ({}): {}",
        stats.pending,
        stats.confirmed,
        stats.cancelled,
        stats.total(),
        format_date(today),
        stats.today
    )
}

pub fn recipient_choice(recipients: &[(ParticipantId, String)]) -> Prompt {
    let rows = recipients
        .iter()
        .map(|(participant, name)| {
            vec![Choice::new(name.clone(), Button::Recipient(*participant))]
        })
        .collect();
    Prompt::text("💬 Para quem deseja enviar a mensagem?").with_buttons(rows)
}

pub fn no_recipients() -> &'static str {
    "ℹ️ Nenhum cliente com conversa registrada."
}

pub fn ask_message() -> Prompt {
    Prompt::text("💬 Digite a mensagem a ser enviada (ou /cancelar):")
}

pub fn forward_result(delivered: bool) -> &'static str {
    if delivered {
        "✅ Mensagem enviada."
    } else {
        "⚠️ Não foi possível entregar a mensagem."
    }
}
