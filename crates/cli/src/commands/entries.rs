use anyhow::Context;
use clap::{Args, Subcommand};

use bodylog_client::{BodyLog, DeleteOutcome};
use bodylog_core::{BodyEntry, EntryForm, Session, today_local};

use crate::OutputFormat;
use crate::commands::confirmation;

#[derive(Args, Debug)]
pub struct EntriesArgs {
    #[command(subcommand)]
    pub command: EntriesCommand,
}

#[derive(Subcommand, Debug)]
pub enum EntriesCommand {
    /// List entries, newest first.
    List,
    /// Save the entry for a day, replacing any existing one.
    Save(SaveArgs),
    /// Delete an entry by id.
    Delete {
        /// Entry id.
        id: String,
    },
}

#[derive(Args, Debug, Default)]
pub struct SaveArgs {
    /// Day of the entry (YYYY-MM-DD). Defaults to today, or to the edited
    /// entry's date with --edit.
    #[arg(long)]
    pub date: Option<String>,
    #[arg(long)]
    pub weight: Option<String>,
    #[arg(long)]
    pub bp_systolic: Option<String>,
    #[arg(long)]
    pub bp_diastolic: Option<String>,
    /// Minutes of exercise.
    #[arg(long)]
    pub exercise: Option<String>,
    /// Minutes of plank.
    #[arg(long)]
    pub plank: Option<String>,
    /// Knee pain, 0 to 10.
    #[arg(long)]
    pub knee_pain: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
    /// Edit an existing entry; fields not given keep their stored values.
    #[arg(long, value_name = "ID")]
    pub edit: Option<String>,
}

impl SaveArgs {
    /// Overlay the given flags on `form`.
    fn apply_to(&self, form: &mut EntryForm) {
        let overrides = [
            (&self.date, &mut form.date),
            (&self.weight, &mut form.weight),
            (&self.bp_systolic, &mut form.bp_systolic),
            (&self.bp_diastolic, &mut form.bp_diastolic),
            (&self.exercise, &mut form.exercise_minutes),
            (&self.plank, &mut form.plank_minutes),
            (&self.knee_pain, &mut form.knee_pain),
            (&self.notes, &mut form.notes),
        ];
        for (flag, field) in overrides {
            if let Some(value) = flag {
                field.clone_from(value);
            }
        }
    }
}

async fn find_entry(app: &BodyLog, id: &str) -> anyhow::Result<BodyEntry> {
    app.entries()
        .entries()
        .await
        .into_iter()
        .find(|e| e.id.as_str() == id)
        .with_context(|| format!("no entry with id {id}"))
}

fn describe(entry: &BodyEntry) -> String {
    let f = &entry.fields;
    let mut parts = vec![entry.date.to_string()];
    if let Some(w) = f.weight {
        parts.push(format!("weight {w}"));
    }
    match (f.bp_systolic, f.bp_diastolic) {
        (None, None) => {}
        (sys, dia) => parts.push(format!(
            "bp {}/{}",
            sys.map_or("-".to_owned(), |v| v.to_string()),
            dia.map_or("-".to_owned(), |v| v.to_string())
        )),
    }
    if let Some(m) = f.exercise_minutes {
        parts.push(format!("exercise {m}m"));
    }
    if let Some(m) = f.plank_minutes {
        parts.push(format!("plank {m}m"));
    }
    parts.push(format!("knee {}", f.knee_pain));
    if let Some(notes) = &f.notes {
        parts.push(format!("\"{notes}\""));
    }
    parts.join("  ")
}

pub async fn run(
    app: &BodyLog,
    session: &Session,
    args: &EntriesArgs,
    format: &OutputFormat,
    assume_yes: bool,
) -> anyhow::Result<()> {
    app.entries().refresh(session).await?;

    match &args.command {
        EntriesCommand::List => {
            let entries = app.entries().entries().await;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                }
                OutputFormat::Text => {
                    println!("{} entries:", entries.len());
                    for entry in &entries {
                        println!("  [{}] {}", entry.id, describe(entry));
                    }
                }
            }
        }
        EntriesCommand::Save(save) => {
            if let Some(id) = &save.edit {
                let entry = find_entry(app, id).await?;
                app.entries().start_edit(&entry).await;
            } else {
                app.entries()
                    .set_form(EntryForm::blank(today_local()))
                    .await;
            }
            let mut form = app.entries().form().await;
            save.apply_to(&mut form);
            app.entries().set_form(form).await;

            let saved = app.entries().submit(session).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&saved)?),
                OutputFormat::Text => println!("Saved [{}] {}", saved.id, describe(&saved)),
            }
        }
        EntriesCommand::Delete { id } => {
            let entry = find_entry(app, id).await?;
            let gate = confirmation(assume_yes);
            match app.entries().delete(session, &entry, gate.as_ref()).await? {
                DeleteOutcome::Deleted => println!("Entry for {} deleted.", entry.date),
                DeleteOutcome::Missing => println!("Entry {id} was already gone."),
                DeleteOutcome::Declined => println!("Cancelled."),
            }
        }
    }
    Ok(())
}
