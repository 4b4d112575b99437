//! CLI wizard: walks the onboarding funnel on stdin/stdout.
//!
//! Generic over the reader and writer so the same loop runs against the
//! terminal and against scripted input in tests.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};

use crate::onboarding::copy::{
    DAILY_USAGE_OPTIONS, UNIT_COST_OPTIONS, duration_options, format_countdown, group_thousands,
    offer_pitch, seats_line,
};
use crate::onboarding::{
    DurationBucket, OfferChoice, OnboardingManager, ProductType, Provisioned, SessionSnapshot, Step,
};

/// Typed at any prompt to go back a step.
const BACK: &str = "back";
/// Typed at any prompt to leave the wizard.
const QUIT: &str = "/quit";

enum Input {
    Line(String),
    Back,
    Quit,
}

/// Interactive front end for one onboarding session.
pub struct Wizard<R, W> {
    manager: Arc<OnboardingManager>,
    lines: Lines<R>,
    out: W,
}

impl<R, W> Wizard<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(manager: Arc<OnboardingManager>, reader: R, out: W) -> Self {
        Self {
            manager,
            lines: reader.lines(),
            out,
        }
    }

    /// Run until the account is provisioned or input ends.
    ///
    /// Returns `None` when the user quits or input runs out first.
    pub async fn run(mut self) -> anyhow::Result<Option<Provisioned>> {
        let outcome = self.drive().await;
        self.manager.close().await;
        self.out.flush().await.context("flushing output")?;
        outcome
    }

    async fn drive(&mut self) -> anyhow::Result<Option<Provisioned>> {
        loop {
            let snapshot = self.manager.snapshot().await;
            self.render_header(&snapshot).await?;

            let result = match snapshot.step {
                Step::ProductType => self.product_step().await?,
                Step::DailyUsage => self.usage_step().await?,
                Step::UnitCost => self.cost_step().await?,
                Step::Duration => self.duration_step().await?,
                Step::Identity => self.identity_step(&snapshot).await?,
                Step::Offer { flash_sale } => self.offer_step(&snapshot, flash_sale).await?,
                Step::Credentials => match self.credentials_step().await? {
                    StepOutcome::Done(provisioned) => {
                        self.render_success(&provisioned).await?;
                        return Ok(Some(provisioned));
                    }
                    other => other,
                },
                Step::Provisioned => return Ok(None),
            };

            match result {
                StepOutcome::Quit => {
                    self.say("Your progress has been saved. See you soon.").await?;
                    return Ok(None);
                }
                StepOutcome::Back => {
                    if let Err(e) = self.manager.go_back().await {
                        self.say(&format!("Can't go back from here ({e}).")).await?;
                    }
                }
                StepOutcome::Failed(message) => self.say(&format!("⚠️  {message}")).await?,
                StepOutcome::Continue | StepOutcome::Done(_) => {}
            }
        }
    }

    async fn product_step(&mut self) -> anyhow::Result<StepOutcome> {
        for (i, product) in ProductType::ALL.iter().enumerate() {
            self.say(&format!("  {}. {} ({})", i + 1, product.label(), product.description()))
                .await?;
        }
        let line = match self.read("Choose 1-4").await? {
            Input::Line(line) => line,
            other => return Ok(other.into()),
        };
        let Some(product) = pick(&line, &ProductType::ALL).or_else(|| ProductType::parse(&line))
        else {
            return Ok(StepOutcome::Failed("Please pick one of the options.".into()));
        };
        Ok(self.manager.select_product(product).await.into())
    }

    async fn usage_step(&mut self) -> anyhow::Result<StepOutcome> {
        let options = DAILY_USAGE_OPTIONS.map(|n| n.to_string()).join(" / ");
        let line = match self.read(&format!("{options}, or any amount")).await? {
            Input::Line(line) => line,
            other => return Ok(other.into()),
        };
        Ok(self.manager.set_daily_usage(&line).await.into())
    }

    async fn cost_step(&mut self) -> anyhow::Result<StepOutcome> {
        let options = UNIT_COST_OPTIONS.map(|n| format!("${n}")).join(" / ");
        let line = match self.read(&format!("{options}, or any amount")).await? {
            Input::Line(line) => line,
            other => return Ok(other.into()),
        };
        let amount = line.trim().trim_start_matches('$').to_string();
        Ok(self.manager.set_unit_cost(&amount).await.into())
    }

    async fn duration_step(&mut self) -> anyhow::Result<StepOutcome> {
        let options = duration_options();
        for (i, (_, label)) in options.iter().enumerate() {
            self.say(&format!("  {}. {label}", i + 1)).await?;
        }
        let line = match self.read("Choose 1-4").await? {
            Input::Line(line) => line,
            other => return Ok(other.into()),
        };
        let Some(bucket) = pick(&line, &DurationBucket::ALL).or_else(|| DurationBucket::parse(&line))
        else {
            return Ok(StepOutcome::Failed("Please pick one of the options.".into()));
        };
        Ok(self.manager.select_duration(bucket).await.into())
    }

    async fn identity_step(&mut self, snapshot: &SessionSnapshot) -> anyhow::Result<StepOutcome> {
        let current = &snapshot.draft.identity;
        let stats = &snapshot.stats;
        self.say(&format!(
            "You use about {} {} a year, costing ${} a year.",
            group_thousands(stats.yearly_usage),
            stats.label.plural,
            group_thousands(stats.yearly_spending)
        ))
        .await?;

        let mut answers = Vec::with_capacity(4);
        for (label, existing) in [
            ("First name", current.first_name.as_str()),
            ("Last name", current.last_name.as_str()),
            ("Email", current.email.as_str()),
            ("Phone (optional)", current.phone.as_str()),
        ] {
            let prompt = if existing.is_empty() {
                label.to_string()
            } else {
                format!("{label} [{existing}]")
            };
            match self.read(&prompt).await? {
                Input::Line(line) if line.is_empty() => answers.push(existing.to_string()),
                Input::Line(line) => answers.push(line),
                other => return Ok(other.into()),
            }
        }
        let opt_in = match self.read("Receive text messages? (y/n)").await? {
            Input::Line(line) => is_yes(&line),
            other => return Ok(other.into()),
        };

        let mut answers = answers.into_iter();
        let mut next = || answers.next().unwrap_or_default();
        let (first_name, last_name, email, phone) = (next(), next(), next(), next());
        let updated = self
            .manager
            .update_identity(move |identity| {
                identity.first_name = first_name;
                identity.last_name = last_name;
                identity.email = email;
                identity.phone = phone;
                identity.opt_in_messages = opt_in;
            })
            .await;
        if let Err(e) = updated {
            return Ok(StepOutcome::Failed(e.to_string()));
        }

        self.say("Checking your email...").await?;
        Ok(self.manager.submit_identity().await.into())
    }

    async fn offer_step(
        &mut self,
        snapshot: &SessionSnapshot,
        flash_sale: bool,
    ) -> anyhow::Result<StepOutcome> {
        self.say(&offer_pitch(flash_sale, &snapshot.stats)).await?;
        if let Some(secs) = snapshot.seconds_left {
            self.say(&format!("Offer expires in {}", format_countdown(secs)))
                .await?;
        }
        if flash_sale {
            if let Some(seats) = snapshot.seats_left {
                self.say(&seats_line(seats)).await?;
            }
        }

        let prompt = if flash_sale {
            "Claim the discount? (y/n)"
        } else {
            "Start now? (y/n)"
        };
        let choice = match self.read(prompt).await? {
            Input::Line(line) if is_yes(&line) => OfferChoice::Accept,
            Input::Line(_) => OfferChoice::Decline,
            other => return Ok(other.into()),
        };
        Ok(self.manager.respond_to_offer(choice).await.into())
    }

    async fn credentials_step(&mut self) -> anyhow::Result<StepOutcome> {
        let password = match self.read("Password").await? {
            Input::Line(line) => line,
            other => return Ok(other.into()),
        };
        let confirm = match self.read("Confirm password").await? {
            Input::Line(line) => line,
            other => return Ok(other.into()),
        };
        let updated = self
            .manager
            .update_credentials(move |credentials| {
                credentials.password = password;
                credentials.confirm_password = confirm;
            })
            .await;
        if let Err(e) = updated {
            return Ok(StepOutcome::Failed(e.to_string()));
        }

        self.say("Creating your account...").await?;
        Ok(match self.manager.finalize().await {
            Ok(provisioned) => StepOutcome::Done(provisioned),
            Err(e) => StepOutcome::Failed(e.to_string()),
        })
    }

    async fn render_header(&mut self, snapshot: &SessionSnapshot) -> anyhow::Result<()> {
        if snapshot.step.is_terminal() {
            return Ok(());
        }
        self.say(&format!(
            "\n[Step {} of {}] {}",
            snapshot.step_number,
            crate::onboarding::state::TOTAL_STEPS,
            snapshot.title
        ))
        .await?;
        if let Some(error) = &snapshot.error {
            self.say(&format!("⚠️  {error}")).await?;
        }
        Ok(())
    }

    async fn render_success(&mut self, provisioned: &Provisioned) -> anyhow::Result<()> {
        let user = &provisioned.session.user;
        let name = user.username.as_deref().unwrap_or(&user.email);
        self.say(&format!("\n✅ Welcome, {name}! Your quit plan is ready."))
            .await
    }

    async fn say(&mut self, text: &str) -> anyhow::Result<()> {
        self.out
            .write_all(format!("{text}\n").as_bytes())
            .await
            .context("writing to output")
    }

    async fn read(&mut self, prompt: &str) -> anyhow::Result<Input> {
        self.out
            .write_all(format!("{prompt} > ").as_bytes())
            .await
            .context("writing prompt")?;
        self.out.flush().await.context("flushing prompt")?;

        match self.lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim().to_string();
                Ok(match line.as_str() {
                    BACK => Input::Back,
                    QUIT => Input::Quit,
                    _ => Input::Line(line),
                })
            }
            Ok(None) => Ok(Input::Quit),
            Err(e) => {
                tracing::error!("Error reading input: {}", e);
                Err(e).context("reading input")
            }
        }
    }
}

enum StepOutcome {
    Continue,
    Back,
    Quit,
    Failed(String),
    Done(Provisioned),
}

impl From<Input> for StepOutcome {
    fn from(input: Input) -> Self {
        match input {
            Input::Back => Self::Back,
            Input::Quit => Self::Quit,
            Input::Line(_) => Self::Continue,
        }
    }
}

impl<T> From<crate::error::Result<T>> for StepOutcome {
    fn from(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(_) => Self::Continue,
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}

/// Resolve a 1-based menu number.
fn pick<T: Copy>(line: &str, options: &[T]) -> Option<T> {
    let index: usize = line.trim().parse().ok()?;
    options.get(index.checked_sub(1)?).copied()
}

fn is_yes(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
