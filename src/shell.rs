//! Interactive terminal front-end
//!
//! Renders the application view, reads commands line by line and walks the
//! user through the form fields. Wallet events are applied as they arrive,
//! between commands.

use crate::app::{App, AppView};
use crate::error::Result;
use crate::forms::{
    CloseAccountForm, FormError, FormSurface, OpenAccountForm, RegisterUserForm, TransferForm,
};
use crate::wallet::WalletEvent;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tokio::sync::broadcast::{self, error::RecvError};

const HELP: &str = "\
Commands:
  connect    connect the wallet
  status     show the connection
  register   register a user
  open       create a joint account
  transfer   transfer between users
  close      close a joint account
  help       show this message
  quit       exit
";

pub struct Shell<R, W> {
    lines: Lines<R>,
    output: W,
}

impl<R, W> Shell<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(input: R, output: W) -> Self {
        Self {
            lines: input.lines(),
            output,
        }
    }

    /// Run until `quit` or end of input
    pub async fn run(&mut self, app: &mut App) -> Result<()> {
        self.render(app).await?;
        let mut events = app.wallet_events();

        loop {
            self.write("> ").await?;

            let line = tokio::select! {
                line = self.lines.next_line() => line?,
                event = next_event(&mut events) => {
                    match event {
                        Some(event) => {
                            self.write("\n").await?;
                            app.handle_wallet_event(&event).await;
                            events = app.wallet_events();
                            self.render(app).await?;
                        }
                        None => events = None,
                    }
                    continue;
                }
            };

            let Some(line) = line else {
                break;
            };

            match line.trim() {
                "" => {}
                "quit" | "exit" => break,
                "help" => self.write(HELP).await?,
                "status" => self.render(app).await?,
                "connect" => {
                    if let Err(e) = app.connect().await {
                        self.write(&format!("Error: {}\n", e)).await?;
                    }
                    events = app.wallet_events();
                    self.render(app).await?;
                }
                "register" => self.run_form(app, RegisterUserForm::default()).await?,
                "open" => self.run_form(app, OpenAccountForm::default()).await?,
                "transfer" => self.run_form(app, TransferForm::default()).await?,
                "close" => self.run_form(app, CloseAccountForm::default()).await?,
                other => {
                    self.write(&format!("Unknown command {:?}. Type `help`.\n", other))
                        .await?
                }
            }
        }

        self.output.flush().await?;
        Ok(())
    }

    async fn run_form<F: FormSurface>(&mut self, app: &App, mut form: F) -> Result<()> {
        if !app.context().is_connected().await {
            return self.render(app).await;
        }

        self.write(&format!("{}\n", F::TITLE)).await?;
        let labels = form.labels();
        for (label, value) in labels.iter().zip(form.values_mut()) {
            self.write(&format!("  {}: ", label)).await?;
            match self.lines.next_line().await? {
                Some(line) => *value = line.trim().to_string(),
                None => return Ok(()),
            }
        }

        match form.submit(app.context()).await {
            Ok(()) => self.write(&format!("{}\n", F::SUCCESS)).await,
            Err(FormError::Failed(message)) => self.write(&format!("Error: {}\n", message)).await,
            Err(e) => self.write(&format!("Error: {}\n", e)).await,
        }
    }

    async fn render(&mut self, app: &App) -> Result<()> {
        let text = match app.view().await {
            AppView::Disconnected {
                wallet_installed: false,
                ..
            } => "No wallet found. Set WALLET_RPC_URL or PRIVATE_KEY to use this app.\n".to_string(),
            AppView::Disconnected { loading: true, .. } => "Connecting...\n".to_string(),
            AppView::Disconnected { .. } => {
                let mut text = String::from("Wallet not connected. Type `connect` to continue.\n");
                if let Some(banner) = app.context().banner().await {
                    text.push_str(&format!("Error: {}\n", banner));
                }
                text
            }
            AppView::Connected { address, banner } => {
                let mut text = format!("Connected: {}\n", address);
                if let Some(session) = app.context().session().await {
                    if session.is_signer_stale() {
                        text.push_str(&format!(
                            "Transactions are signed by {}\n",
                            session.signer_address
                        ));
                    }
                }
                if let Some(banner) = banner {
                    text.push_str(&format!("Error: {}\n", banner));
                }
                text
            }
        };
        self.write(&text).await
    }

    async fn write(&mut self, text: &str) -> Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.flush().await?;
        Ok(())
    }
}

/// Next wallet event; `None` once the channel is gone. Pends forever without
/// a subscription.
async fn next_event(events: &mut Option<broadcast::Receiver<WalletEvent>>) -> Option<WalletEvent> {
    let Some(rx) = events.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped = skipped, "Dropped wallet events");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}
