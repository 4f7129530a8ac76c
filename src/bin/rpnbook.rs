use clap::{Parser as CliParser, Subcommand};
use rpnbook::functions;
use rpnbook::{
    format_date, Context, Date, Decimal, Error, ErrorType, Flow, Outcome, Parser, Quantity,
    Tagged, Transaction,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");

#[derive(Debug, CliParser)]
#[command(
    name = "rpnbook",
    about = "Checks and reports on double-entry ledgers written in reverse Polish notation.",
    version = VERSION,
    author = AUTHOR,
)]
struct Cli {
    /// Ledger file to read instead of standard input
    #[arg(short)]
    input: Option<PathBuf>,
    /// Stop parsing once the ledger moves past this day (YYYY-MM-DD)
    #[arg(short, long, global = true)]
    date: Option<Date>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check the ledger for errors (the default)
    Check,
    /// Print open accounts
    Accounts {
        /// Also print closed accounts, with a closing date column
        #[arg(short = 'c', long)]
        print_closed_accounts: bool,
        /// Also print opening dates
        #[arg(short = 'o', long)]
        print_opening_dates: bool,
    },
    /// Print the lots of open accounts
    Lots {
        /// Also print default lots
        #[arg(short = 'D', long)]
        print_default_lots: bool,
        /// Print assertions in the ledger language instead of CSV
        #[arg(short = 'a', long)]
        print_assertions: bool,
    },
    /// Print tags
    Tags {
        /// Print tagged open accounts
        #[arg(short = 'a', long)]
        print_accounts: bool,
        /// Print tagged commodities
        #[arg(short = 'c', long)]
        print_commodities: bool,
    },
    /// Print every transfer affecting one commodity in one account
    Register {
        account: String,
        commodity: String,
        /// Day to start printing transfers (YYYY-MM-DD)
        #[arg(short, long)]
        start_date: Option<Date>,
        /// Limit results to this lot instead of the default lot
        #[arg(short, long, default_value = "")]
        lot: String,
        /// Also print this transaction note; may be repeated
        #[arg(short = 'n', long = "note")]
        notes: Vec<String>,
        /// Also print exchange rates
        #[arg(short = 'x', long)]
        print_exchange_rates: bool,
        /// Start with a zero balance on the start date
        #[arg(short = 'z', long)]
        zero_balance: bool,
    },
}

/// Replaces `date` with a version that stops the run once the clock passes
/// `cutoff`.
fn stop_after(parser: &mut Parser<'_>, cutoff: Option<Date>) {
    if let Some(cutoff) = cutoff {
        parser.register("date", move |fn_name, op, ctx: &mut Context| {
            functions::date(fn_name, op, ctx)?;
            if ctx.date() > Some(cutoff) {
                Ok(Flow::Stop)
            } else {
                Ok(Flow::Continue)
            }
        });
    }
}

fn load(parser: &mut Parser<'_>, input: Option<&Path>) -> Result<Outcome, Error> {
    match input {
        Some(path) => parser.parse_file(path),
        None => parser.parse(io::stdin().lock()),
    }
}

/// Quotes a name for the ledger language.
fn quote(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for c in name.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn write_rows<W, R>(w: &mut csv::Writer<W>, rows: R) -> io::Result<()>
where
    W: io::Write,
    R: IntoIterator,
    R::Item: IntoIterator,
    <R::Item as IntoIterator>::Item: AsRef<[u8]>,
{
    for row in rows {
        w.write_record(row)?;
    }
    Ok(())
}

fn accounts<W: io::Write>(ctx: &Context, closed: bool, opening: bool, out: W) -> io::Result<()> {
    let mut w = csv::Writer::from_writer(out);
    let mut header = vec!["name"];
    if opening {
        header.push("opening date");
    }
    if closed {
        header.push("closing date");
    }
    w.write_record(&header)?;
    let mut rows: Vec<Vec<String>> = ctx
        .accounts()
        .values()
        .filter(|a| closed || !a.is_closed())
        .map(|a| {
            let mut row = vec![a.name().clone()];
            if opening {
                row.push(format_date(a.creation_date()));
            }
            if closed {
                row.push(format_date(a.closing_date()));
            }
            row
        })
        .collect();
    rows.sort();
    write_rows(&mut w, rows)?;
    w.flush()
}

fn lots<W: io::Write>(
    ctx: &Context,
    default_lots: bool,
    assertions: bool,
    mut out: W,
) -> io::Result<()> {
    let mut rows = vec![];
    for account in ctx.accounts().values().filter(|a| !a.is_closed()) {
        for (lot_name, by_commodity) in account.lots() {
            if lot_name.is_empty() && !default_lots {
                continue;
            }
            for (commodity, lot) in by_commodity {
                let (unit, total) = lot.exchange_rate().as_ref().map_or_else(
                    || (String::new(), String::new()),
                    |r| (r.unit_price.to_string(), r.total_price.to_string()),
                );
                rows.push(vec![
                    account.name().clone(),
                    lot_name.clone(),
                    commodity.clone(),
                    lot.balance().to_string(),
                    unit,
                    total,
                ]);
            }
        }
    }
    rows.sort();
    if assertions {
        for row in rows {
            if row[1].is_empty() {
                writeln!(out, "{} {} assert", quote(&row[0]), row[3])?;
            } else {
                writeln!(out, "{} {} {} assert-lot", quote(&row[0]), quote(&row[1]), row[3])?;
            }
        }
        return out.flush();
    }
    let mut w = csv::Writer::from_writer(out);
    w.write_record([
        "account name",
        "lot name",
        "commodity",
        "balance",
        "unit price",
        "total price",
    ])?;
    write_rows(&mut w, rows)?;
    w.flush()
}

fn tags<W: io::Write>(ctx: &Context, accounts: bool, commodities: bool, out: W) -> io::Result<()> {
    let mut w = csv::Writer::from_writer(out);
    if !accounts && !commodities {
        w.write_record(["name"])?;
        let mut names: Vec<&String> = ctx.tags().keys().collect();
        names.sort();
        for name in names {
            w.write_record([name])?;
        }
        return w.flush();
    }
    w.write_record(["name", "type", "name"])?;
    let mut rows = vec![];
    for (tag, tagged) in ctx.tags() {
        for entity in tagged {
            let kind = match entity {
                Tagged::Account(name)
                    if accounts && ctx.accounts().get(name).map_or(false, |a| !a.is_closed()) =>
                {
                    "account"
                }
                Tagged::Commodity(_) if commodities => "commodity",
                _ => continue,
            };
            rows.push([tag.clone(), kind.to_string(), entity.name().to_string()]);
        }
    }
    rows.sort();
    write_rows(&mut w, rows)?;
    w.flush()
}

struct RegisterOptions {
    account: String,
    commodity: String,
    start_date: Option<Date>,
    lot: String,
    notes: Vec<String>,
    print_exchange_rates: bool,
    zero_balance: bool,
}

/// Collects one row per executed transfer that touches the chosen account,
/// lot, and commodity. `load` feeds the ledger to the parser.
fn register<L>(cutoff: Option<Date>, opts: RegisterOptions, load: L) -> Result<Vec<Vec<String>>, Error>
where
    L: FnOnce(&mut Parser<'_>) -> Result<Outcome, Error>,
{
    let mut rows = vec![];
    let mut header: Vec<String> = ["date", "entity", "amount", "balance"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    if opts.print_exchange_rates {
        header.push("unit price".to_string());
        header.push("total price".to_string());
    }
    header.extend(opts.notes.iter().cloned());
    rows.push(header);

    let mut running = opts.zero_balance.then_some(Decimal::ZERO);
    let rows_out = &mut rows;
    let mut parser = Parser::default();
    stop_after(&mut parser, cutoff);
    parser.register("xact", move |fn_name, mut op, ctx: &mut Context| {
        let xact = Transaction::from_operands(&mut op)
            .and_then(|t| t.execute(ctx).map(|_| t))
            .map_err(|e| Error::new(e.r#type, format!("{}: {}", fn_name, e.msg)))?;
        let started = opts
            .start_date
            .map_or(true, |start| ctx.date().map_or(false, |d| d >= start));
        if !started {
            return Ok(Flow::Continue);
        }
        for t in &xact.transfers {
            if t.account != opts.account
                || t.lot != opts.lot
                || t.quantity.commodity != opts.commodity
            {
                continue;
            }
            let balance = match running.as_mut() {
                Some(sum) => {
                    *sum = sum.checked_add(t.quantity.amount).ok_or_else(|| {
                        Error::new(ErrorType::Number, format!("{}: amount overflow", fn_name))
                    })?;
                    *sum
                }
                None => ctx
                    .accounts()
                    .get(&t.account)
                    .and_then(|a| a.balance(&t.lot, &opts.commodity))
                    .unwrap_or_default(),
            };
            let mut row = vec![
                format_date(ctx.date()),
                xact.entity.clone(),
                t.quantity.to_string(),
                Quantity::new(balance, opts.commodity.as_str()).to_string(),
            ];
            if opts.print_exchange_rates {
                match &t.exchange_rate {
                    Some(r) => {
                        row.push(r.unit_price.to_string());
                        row.push(r.total_price.to_string());
                    }
                    None => row.extend([String::new(), String::new()]),
                }
            }
            for note in &opts.notes {
                row.push(xact.notes.get(note).cloned().unwrap_or_default());
            }
            rows_out.push(row);
        }
        Ok(Flow::Continue)
    });
    load(&mut parser)?;
    drop(parser);
    Ok(rows)
}

/// Runs the ledger with the `-d` cutoff in place and returns what it built.
fn build(input: Option<&Path>, cutoff: Option<Date>) -> Result<Context, Error> {
    let mut parser = Parser::default();
    stop_after(&mut parser, cutoff);
    load(&mut parser, input)?;
    Ok(parser.into_context())
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let input = cli.input.as_deref();
    let out = io::stdout().lock();
    match cli.command.unwrap_or(Commands::Check) {
        Commands::Check => {
            build(input, cli.date)?;
        }
        Commands::Accounts {
            print_closed_accounts,
            print_opening_dates,
        } => {
            let ctx = build(input, cli.date)?;
            accounts(&ctx, print_closed_accounts, print_opening_dates, out)?;
        }
        Commands::Lots {
            print_default_lots,
            print_assertions,
        } => {
            let ctx = build(input, cli.date)?;
            lots(&ctx, print_default_lots, print_assertions, out)?;
        }
        Commands::Tags {
            print_accounts,
            print_commodities,
        } => {
            let ctx = build(input, cli.date)?;
            tags(&ctx, print_accounts, print_commodities, out)?;
        }
        Commands::Register {
            account,
            commodity,
            start_date,
            lot,
            notes,
            print_exchange_rates,
            zero_balance,
        } => {
            let opts = RegisterOptions {
                account,
                commodity,
                start_date,
                lot,
                notes,
                print_exchange_rates,
                zero_balance,
            };
            let rows = register(cli.date, opts, |parser| load(parser, input))?;
            let mut w = csv::Writer::from_writer(out);
            write_rows(&mut w, rows)?;
            w.flush()?;
        }
    }
    Ok(())
}

fn main() {
    pretty_env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{}", e);
        process::exit(2);
    }
}
