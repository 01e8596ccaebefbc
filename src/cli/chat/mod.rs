pub mod conversation_state;
pub mod prompt;

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use crossterm::style::Stylize;
use eyre::Result;
use rustyline::error::ReadlineError;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::cli::chat::conversation_state::{
    ConversationState, Message, Role, SharedConversation, StateChange,
};
use crate::simulator::{ResponseSimulator, SimulatorConfig};

const WELCOME_TEXT: &str = "
Hi, I'm your support assistant. Ask me anything.

Things to try
• What are your hours?
• Where is my order?
• How do I reset my password?

/help         Show the help dialogue
/quit         Quit the application
";

const HELP_TEXT: &str = "
Support Chat CLI

/clear        Restart the conversation
/help         Show this help dialogue
/quit         Quit the application
";

pub struct ChatContext {
    output: Box<dyn Write>,
    input: Option<String>,
    interactive: bool,
    conversation: SharedConversation,
    simulator: ResponseSimulator,
    events: mpsc::UnboundedReceiver<StateChange>,
}

impl ChatContext {
    pub fn new(output: Box<dyn Write>, input: Option<String>, interactive: bool) -> Self {
        let mut state = ConversationState::new();
        let events = state.subscribe();
        let conversation: SharedConversation = Arc::new(Mutex::new(state));
        let simulator =
            ResponseSimulator::new(Arc::clone(&conversation), SimulatorConfig::from_env());
        Self {
            output,
            input,
            interactive,
            conversation,
            simulator,
            events,
        }
    }

    pub async fn run(&mut self) -> Result<ExitCode> {
        if self.interactive {
            self.print_welcome()?;
        }

        // Show the seeded greeting before the first prompt.
        self.render_transcript().await?;

        // Handle non-interactive mode (single query)
        if let Some(input) = self.input.take() {
            self.handle_input(&input).await?;
            return Ok(ExitCode::SUCCESS);
        }

        // Interactive mode
        if self.interactive {
            self.run_interactive().await?;
        }

        Ok(ExitCode::SUCCESS)
    }

    fn print_welcome(&mut self) -> Result<()> {
        writeln!(self.output, "{}", WELCOME_TEXT)?;
        Ok(())
    }

    async fn run_interactive(&mut self) -> Result<()> {
        let mut rl = prompt::rl()?;

        loop {
            let prompt_text = prompt::generate_prompt(None);
            let readline = rl.readline(&prompt_text);

            match readline {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }

                    rl.add_history_entry(line.as_str());

                    if line.trim() == "/quit" {
                        break;
                    }

                    if let Err(e) = self.handle_input(&line).await {
                        writeln!(self.output, "Error: {}", e)?;
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => {
                    writeln!(self.output, "Error: {}", e)?;
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_input(&mut self, input: &str) -> Result<()> {
        match input.trim() {
            "/help" => {
                writeln!(self.output, "{}", HELP_TEXT)?;
            }
            "/clear" => {
                self.conversation.lock().await.clear();
                writeln!(self.output, "Conversation cleared.")?;
                self.render_transcript().await?;
            }
            _ => {
                self.process_chat_input(input).await?;
            }
        }

        Ok(())
    }

    /// Append the user message, kick off the simulator, and stay here until
    /// its reply lands. Not prompting while the reply is pending is what
    /// disables input during the typing window.
    async fn process_chat_input(&mut self, input: &str) -> Result<()> {
        self.conversation.lock().await.append_user_message(input);
        debug!("User message appended, invoking simulator");
        // The reply task is detached; its completion arrives as an event.
        let _ = self.simulator.respond_to(input).await;
        self.wait_for_reply().await?;
        Ok(())
    }

    async fn wait_for_reply(&mut self) -> Result<()> {
        while let Some(change) = self.events.recv().await {
            match change {
                StateChange::UserMessage(message) => self.render_message(&message)?,
                StateChange::Typing(true) => {
                    writeln!(self.output, "{}", "assistant is typing…".dim())?;
                }
                StateChange::Typing(false) => {}
                StateChange::AssistantMessage(message) => {
                    self.render_message(&message)?;
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    async fn render_transcript(&mut self) -> Result<()> {
        let messages: Vec<Message> = self.conversation.lock().await.messages().to_vec();
        for message in &messages {
            self.render_message(message)?;
        }
        Ok(())
    }

    fn render_message(&mut self, message: &Message) -> Result<()> {
        let line = match message.role {
            Role::User => format!("{} {}", "you>".cyan(), message.content),
            Role::Assistant => format!("{} {}", "assistant>".green(), message.content),
        };
        writeln!(self.output, "{}", line)?;
        Ok(())
    }
}
