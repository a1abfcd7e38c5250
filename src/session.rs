//! Interactive chat shell state and command handling.
//!
//! A [`Session`] holds the conversation and the record being edited. Each
//! handler takes the session by value and hands back the next one, so the
//! caller owns the state between inputs.

use crate::assistant::{suggested_questions, AssistantGateway, FAILURE_MARKER};
use crate::cli::OutputFormat;
use crate::models::{ShiftRecord, ShiftUpdate};
use crate::money::parse_date_br;
use crate::report::{record_line, render_records, ReportBuilder};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Most recent turns forwarded to the completion provider.
pub const MAX_HISTORY_TURNS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub history: Vec<ChatTurn>,
    /// Draft of the record being edited, not yet saved.
    pub editing: Option<ShiftRecord>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a question and its answer, keeping the last
    /// [`MAX_HISTORY_TURNS`] turns. Failure notices are not kept.
    fn with_exchange(mut self, question: &str, answer: &str) -> Self {
        if answer.starts_with(FAILURE_MARKER) {
            debug!("assistant failed, exchange left out of the history");
            return self;
        }
        self.history.push(ChatTurn {
            role: ChatRole::User,
            text: question.to_string(),
        });
        self.history.push(ChatTurn {
            role: ChatRole::Assistant,
            text: answer.to_string(),
        });
        let excess = self.history.len().saturating_sub(MAX_HISTORY_TURNS);
        self.history.drain(..excess);
        self
    }
}

/// One line of operator input.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Ask(String),
    /// List the suggested questions, or ask the n-th one (1-based).
    Suggest(Option<usize>),
    Today,
    Edit(i64),
    Set(Vec<(String, String)>),
    Save,
    Cancel,
    Reset,
    Help,
    Quit,
}

/// Parse a line typed in the shell. Anything not starting with `/` is a question.
pub fn parse_command(line: &str) -> Result<ShellCommand, String> {
    let line = line.trim();
    if line.is_empty() {
        return Err("Digite uma pergunta ou /help.".to_string());
    }
    let Some(command) = line.strip_prefix('/') else {
        return Ok(ShellCommand::Ask(line.to_string()));
    };

    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((command, ""));

    match name.to_lowercase().as_str() {
        "suggest" | "sugestoes" => {
            if rest.is_empty() {
                Ok(ShellCommand::Suggest(None))
            } else {
                rest.parse::<usize>()
                    .ok()
                    .filter(|n| (1..=suggested_questions().len()).contains(n))
                    .map(|n| ShellCommand::Suggest(Some(n)))
                    .ok_or_else(|| format!("Sugestão inválida: {}", rest))
            }
        }
        "today" | "hoje" => Ok(ShellCommand::Today),
        "edit" | "editar" => rest
            .parse::<i64>()
            .map(ShellCommand::Edit)
            .map_err(|_| "Uso: /edit ID".to_string()),
        "set" => parse_assignments(rest).map(ShellCommand::Set),
        "save" | "salvar" => Ok(ShellCommand::Save),
        "cancel" | "cancelar" => Ok(ShellCommand::Cancel),
        "reset" | "limpar" => Ok(ShellCommand::Reset),
        "help" | "ajuda" => Ok(ShellCommand::Help),
        "quit" | "exit" | "sair" => Ok(ShellCommand::Quit),
        other => Err(format!("Comando desconhecido: /{}", other)),
    }
}

/// Split `field=value` pairs; words without `=` continue the previous value.
fn parse_assignments(text: &str) -> Result<Vec<(String, String)>, String> {
    let mut pairs: Vec<(String, String)> = Vec::new();

    for word in text.split_whitespace() {
        match word.split_once('=') {
            Some((field, value)) => pairs.push((field.to_lowercase(), value.to_string())),
            None => match pairs.last_mut() {
                Some((_, value)) => {
                    value.push(' ');
                    value.push_str(word);
                }
                None => return Err(format!("Esperado campo=valor, recebido '{}'", word)),
            },
        }
    }

    if pairs.is_empty() {
        return Err("Uso: /set campo=valor ...".to_string());
    }
    Ok(pairs)
}

/// Apply `field=value` pairs to a draft record.
fn apply_assignments(
    mut draft: ShiftRecord,
    pairs: &[(String, String)],
) -> Result<ShiftRecord, String> {
    for (field, value) in pairs {
        match field.as_str() {
            "name" | "nome" => {
                let name = value.trim();
                if name.is_empty() {
                    return Err("O nome não pode ficar vazio.".to_string());
                }
                draft.worker_name = name.to_string();
            }
            "date" | "data" => {
                draft.date =
                    parse_date_br(value).ok_or_else(|| format!("Data inválida: {}", value))?;
            }
            "shift" | "turno" => draft.shift = value.parse()?,
            "kind" | "tipo" => draft.worker_kind = value.parse()?,
            "deliveries" | "entregas" => {
                draft.delivery_count = value
                    .trim()
                    .parse()
                    .map_err(|_| format!("Número de entregas inválido: {}", value))?;
            }
            other => return Err(format!("Campo desconhecido: {}", other)),
        }
    }
    Ok(draft)
}

/// Result of handling one input.
#[derive(Debug)]
pub struct Reply {
    pub session: Session,
    pub output: String,
    pub quit: bool,
}

impl Reply {
    fn show(session: Session, output: impl Into<String>) -> Self {
        Self {
            session,
            output: output.into(),
            quit: false,
        }
    }
}

pub const HELP_TEXT: &str = "\
Digite uma pergunta para o assistente ou um comando:
  /suggest [N]      perguntas sugeridas (N pergunta a N-ésima)
  /today            registros de hoje
  /edit ID          começa a editar um registro
  /set campo=valor  altera o rascunho (nome, data, turno, tipo, entregas)
  /save             grava o rascunho
  /cancel           descarta o rascunho
  /reset            limpa a conversa
  /quit             sai";

/// Command handlers bound to the collaborators of one shell run.
pub struct Shell<'a> {
    builder: &'a ReportBuilder,
    gateway: &'a AssistantGateway,
    today: NaiveDate,
}

impl<'a> Shell<'a> {
    pub fn new(builder: &'a ReportBuilder, gateway: &'a AssistantGateway, today: NaiveDate) -> Self {
        Self {
            builder,
            gateway,
            today,
        }
    }

    /// Parse and run one input line.
    pub async fn handle_line(&self, session: Session, line: &str) -> Reply {
        match parse_command(line) {
            Ok(command) => self.handle(session, command).await,
            Err(message) => Reply::show(session, message),
        }
    }

    pub async fn handle(&self, session: Session, command: ShellCommand) -> Reply {
        debug!(?command, "shell command");
        match command {
            ShellCommand::Ask(question) => self.ask(session, &question).await,
            ShellCommand::Suggest(None) => {
                let list: Vec<String> = suggested_questions()
                    .iter()
                    .enumerate()
                    .map(|(i, q)| format!("  {}. {}", i + 1, q))
                    .collect();
                Reply::show(session, format!("💡 Sugestões:\n{}", list.join("\n")))
            }
            ShellCommand::Suggest(Some(n)) => {
                match n.checked_sub(1).and_then(|i| suggested_questions().get(i).copied()) {
                    Some(question) => self.ask(session, question).await,
                    None => Reply::show(session, format!("Sugestão inválida: {}", n)),
                }
            }
            ShellCommand::Today => self.today_records(session).await,
            ShellCommand::Edit(id) => self.start_edit(session, id).await,
            ShellCommand::Set(pairs) => set_fields(session, &pairs),
            ShellCommand::Save => self.save(session).await,
            ShellCommand::Cancel => {
                let mut session = session;
                let output = match session.editing.take() {
                    Some(draft) => format!("Edição do registro #{} descartada.", draft.id),
                    None => "Nada sendo editado.".to_string(),
                };
                Reply::show(session, output)
            }
            ShellCommand::Reset => {
                let mut session = session;
                session.history.clear();
                Reply::show(session, "Conversa limpa.")
            }
            ShellCommand::Help => Reply::show(session, HELP_TEXT),
            ShellCommand::Quit => Reply {
                session,
                output: String::new(),
                quit: true,
            },
        }
    }

    async fn ask(&self, session: Session, question: &str) -> Reply {
        let dashboard = self.builder.build_dashboard(self.today).await;
        let answer = self
            .gateway
            .ask_assistant(
                question,
                &dashboard.kpis.value,
                &dashboard.weekly.value,
                &dashboard.effective_rates(),
                &session.history,
            )
            .await;

        let session = session.with_exchange(question, &answer);
        Reply::show(session, answer)
    }

    async fn today_records(&self, session: Session) -> Reply {
        let output = match self.builder.store().list_shift_records_for_date(self.today).await {
            Ok(records) => render_records(&records, OutputFormat::Text)
                .unwrap_or_else(|e| format!("❌ {}", e)),
            Err(e) => {
                warn!(error = %e, "cannot list today's records");
                format!("❌ {}", e)
            }
        };
        Reply::show(session, output)
    }

    async fn start_edit(&self, mut session: Session, id: i64) -> Reply {
        match self.builder.store().get_shift_record(id).await {
            Ok(Some(record)) => {
                let output = format!(
                    "✏️ Editando {}\nUse /set campo=valor, depois /save ou /cancel.",
                    record_line(&record)
                );
                session.editing = Some(record);
                Reply::show(session, output)
            }
            Ok(None) => Reply::show(session, format!("Registro #{} não encontrado.", id)),
            Err(e) => Reply::show(session, format!("❌ {}", e)),
        }
    }

    async fn save(&self, mut session: Session) -> Reply {
        let Some(draft) = session.editing.clone() else {
            return Reply::show(session, "Nada sendo editado.");
        };

        let update = ShiftUpdate {
            worker_name: Some(draft.worker_name.clone()),
            date: Some(draft.date),
            shift: Some(draft.shift),
            worker_kind: Some(draft.worker_kind),
            delivery_count: Some(draft.delivery_count),
        };

        match self.builder.store().update_shift_record(draft.id, update).await {
            Ok(saved) => {
                session.editing = None;
                Reply::show(session, format!("✅ Salvo: {}", record_line(&saved)))
            }
            Err(e) => Reply::show(session, format!("❌ {}", e)),
        }
    }
}

fn set_fields(mut session: Session, pairs: &[(String, String)]) -> Reply {
    let Some(draft) = session.editing.take() else {
        return Reply::show(session, "Use /edit ID antes de /set.");
    };

    match apply_assignments(draft.clone(), pairs) {
        Ok(updated) => {
            let output = format!("Rascunho: {}", record_line(&updated));
            session.editing = Some(updated);
            Reply::show(session, output)
        }
        Err(message) => {
            session.editing = Some(draft);
            Reply::show(session, format!("❌ {}", message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::CompletionProvider;
    use crate::error::AssistantError;
    use crate::models::{NewShiftRecord, Shift, WorkerKind};
    use crate::store::{RecordStore, SqliteStore};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct FixedProvider;

    #[async_trait]
    impl CompletionProvider for FixedProvider {
        async fn complete(
            &self,
            _system: &str,
            history: &[ChatTurn],
            user_text: &str,
        ) -> Result<String, AssistantError> {
            Ok(format!("{} turnos antes de '{}'", history.len(), user_text))
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl CompletionProvider for FailingProvider {
        async fn complete(
            &self,
            _system: &str,
            _history: &[ChatTurn],
            _user_text: &str,
        ) -> Result<String, AssistantError> {
            Err(AssistantError::Api {
                status: 500,
                body: "overloaded".to_string(),
            })
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    async fn setup() -> (TempDir, ReportBuilder, AssistantGateway, i64) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path().join("motoboys.db")).unwrap();
        let store: Arc<dyn RecordStore> = Arc::new(store);
        let record = store
            .insert_shift_record(NewShiftRecord {
                worker_name: "Ana".to_string(),
                date: day(14),
                shift: Shift::Morning,
                worker_kind: WorkerKind::Salaried,
                delivery_count: 5,
            })
            .await
            .unwrap();

        let gateway = AssistantGateway::new(Box::new(FixedProvider));
        (dir, ReportBuilder::new(store), gateway, record.id)
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(
            parse_command("Quem trabalhou hoje?").unwrap(),
            ShellCommand::Ask("Quem trabalhou hoje?".to_string())
        );
        assert_eq!(parse_command("/suggest").unwrap(), ShellCommand::Suggest(None));
        assert_eq!(parse_command("/suggest 2").unwrap(), ShellCommand::Suggest(Some(2)));
        assert!(parse_command("/suggest 9").is_err());
        assert_eq!(parse_command("/edit 12").unwrap(), ShellCommand::Edit(12));
        assert!(parse_command("/edit x").is_err());
        assert_eq!(parse_command("/QUIT").unwrap(), ShellCommand::Quit);
        assert!(parse_command("/dance").is_err());
        assert!(parse_command("   ").is_err());
    }

    #[test]
    fn test_parse_assignments_joins_words() {
        let pairs = parse_assignments("nome=Ana Maria entregas=7").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("nome".to_string(), "Ana Maria".to_string()),
                ("entregas".to_string(), "7".to_string())
            ]
        );
        assert!(parse_assignments("Ana").is_err());
        assert!(parse_assignments("").is_err());
    }

    #[tokio::test]
    async fn test_questions_accumulate_history() {
        let (_dir, builder, gateway, _) = setup().await;
        let shell = Shell::new(&builder, &gateway, day(14));

        let reply = shell.handle_line(Session::new(), "Resumo de custos").await;
        assert_eq!(reply.output, "0 turnos antes de 'Resumo de custos'");

        let reply = shell.handle_line(reply.session, "/suggest 1").await;
        assert_eq!(reply.output, "2 turnos antes de 'Quem foi mais produtivo?'");
        assert_eq!(reply.session.history.len(), 4);

        let reply = shell.handle_line(reply.session, "/reset").await;
        assert!(reply.session.history.is_empty());
    }

    #[tokio::test]
    async fn test_failed_answers_stay_out_of_history() {
        let (_dir, builder, _, _) = setup().await;
        let gateway = AssistantGateway::new(Box::new(FailingProvider));
        let shell = Shell::new(&builder, &gateway, day(14));

        let reply = shell.handle_line(Session::new(), "Resumo de custos").await;
        assert!(reply.output.starts_with("❌ Erro na API"));
        assert!(reply.session.history.is_empty());
    }

    #[test]
    fn test_history_keeps_latest_turns() {
        let mut session = Session::new();
        for i in 0..15 {
            session = session.with_exchange(&format!("pergunta {}", i), "resposta");
        }

        assert_eq!(session.history.len(), MAX_HISTORY_TURNS);
        assert_eq!(session.history[0].role, ChatRole::User);
        assert_eq!(session.history[0].text, "pergunta 5");
    }

    #[tokio::test]
    async fn test_edit_set_save() {
        let (_dir, builder, gateway, id) = setup().await;
        let shell = Shell::new(&builder, &gateway, day(14));

        let reply = shell.handle_line(Session::new(), &format!("/edit {}", id)).await;
        assert!(reply.session.editing.is_some());

        let reply = shell
            .handle_line(reply.session, "/set entregas=9 turno=noite")
            .await;
        let draft = reply.session.editing.clone().unwrap();
        assert_eq!(draft.delivery_count, 9);
        assert_eq!(draft.shift, Shift::Night);

        let reply = shell.handle_line(reply.session, "/save").await;
        assert!(reply.output.starts_with("✅"));
        assert!(reply.session.editing.is_none());

        let stored = builder.store().get_shift_record(id).await.unwrap().unwrap();
        assert_eq!(stored.delivery_count, 9);
        assert_eq!(stored.shift, Shift::Night);
    }

    #[tokio::test]
    async fn test_invalid_set_keeps_draft() {
        let (_dir, builder, gateway, id) = setup().await;
        let shell = Shell::new(&builder, &gateway, day(14));

        let reply = shell.handle_line(Session::new(), &format!("/edit {}", id)).await;
        let reply = shell.handle_line(reply.session, "/set entregas=muitas").await;
        assert!(reply.output.starts_with("❌"));
        assert_eq!(reply.session.editing.as_ref().unwrap().delivery_count, 5);

        let reply = shell.handle_line(reply.session, "/cancel").await;
        assert!(reply.session.editing.is_none());
    }

    #[tokio::test]
    async fn test_set_without_edit() {
        let (_dir, builder, gateway, _) = setup().await;
        let shell = Shell::new(&builder, &gateway, day(14));

        let reply = shell.handle_line(Session::new(), "/set entregas=3").await;
        assert_eq!(reply.output, "Use /edit ID antes de /set.");
    }

    #[tokio::test]
    async fn test_today_and_quit() {
        let (_dir, builder, gateway, _) = setup().await;
        let shell = Shell::new(&builder, &gateway, day(14));

        let reply = shell.handle_line(Session::new(), "/today").await;
        assert!(reply.output.contains("Ana (Fixo) - 5 entregas"));

        let reply = shell.handle_line(reply.session, "/quit").await;
        assert!(reply.quit);
    }

    #[tokio::test]
    async fn test_edit_missing_record() {
        let (_dir, builder, gateway, _) = setup().await;
        let shell = Shell::new(&builder, &gateway, day(14));

        let reply = shell.handle_line(Session::new(), "/edit 999").await;
        assert_eq!(reply.output, "Registro #999 não encontrado.");
        assert!(reply.session.editing.is_none());
    }
}
