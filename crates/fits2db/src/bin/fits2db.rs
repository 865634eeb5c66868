//! Command-line entry point: convert FITS binary tables to database load
//! streams or plain text tables.

use std::env;
use std::process;

use eyre::{bail, Result as EyreResult};

use fits2db::convert::run_files;
use fits2db::{Error, OutputFormat, RunConfig};

const USAGE: &str = "\
Usage:  fits2db [<opts>] [ <input> ... ]

  where <opts> include:

      -h,--help                this message
      -d,--debug               set debug flag
      -v,--verbose             set verbose output flag
      -n,--noop                set no-op flag

                                   INPUT PROCESSING OPTIONS
      -b,--bundle=<N>          bundle <N> files at a time
      -c,--chunk=<N>           process <N> rows at a time
      -e,--extnum=<N>          process table in FITS extension number <N>
      -E,--extname=<name>      process table in FITS extension name <name>
      -i,--input=<file>        set input filename
      -o,--output=<file>       set output filename
      -r,--rowrange=<range>    convert rows within given <range>
      -s,--select=<expr>       select rows based on <expr>

                                   PROCESSING OPTIONS
      -C,--concat              concatenate all input files to output
      -H,--noheader            suppress CSV column header
      -N,--nostrip             don't strip strings of whitespace
      -Q,--noquote             don't quote strings in text formats
      -S,--singlequote         use single quotes for strings
      -X,--explode             explode array cols to separate columns

                                   FORMAT OPTIONS
      --asv                    output an ascii-separated value table
      --bsv                    output a bar-separated value table
      --csv                    output a comma-separated value table
      --tsv                    output a tab-separated value table
      --ipac                   output an IPAC formatted table

                                   SQL OPTIONS
      -B,--binary              output binary SQL
      -O,--oid                 create table with OIDs (Postgres only)
      -t,--table=<name>        create table named <name>
      -Z,--noload              don't create table load commands

      --sql=<db>               output SQL correct for <db> type
      --drop                   drop existing DB table before conversion
      --dbname=<name>          create DB of the given name
      --create                 create DB table from input table structure
      --truncate               truncate DB table before loading
      --sid=<colname>          add a sequential-ID column (integer)
      --rid=<colname>          add a random-ID column (float: 0.0 -> 100.0)
      --add=<colname>          add the named column, filled with 1

  Examples:

    1)  Load all FITS tables in a directory to a new Postgres table named
        'mytab', expanding arrays to new columns:

          fits2db --sql=postgres --create -C -X -t mytab *.fits | psql

    2)  Convert a FITS bintable to CSV on the standard output:

          fits2db --csv test.fits
";

#[derive(Debug, Default)]
struct Cli {
    cfg: RunConfig,
    inputs: Vec<String>,
    input_opt: Option<String>,
    rowrange: Option<String>,
    select: Option<String>,
    show_help: bool,
    noop: bool,
}

fn parse_usize(opt: &str, val: &str) -> EyreResult<usize> {
    val.parse::<usize>()
        .map_err(|_| eyre::eyre!("value '{}' for option '{}' is not an integer", val, opt))
}

fn apply_sql_dialect(cfg: &mut RunConfig, val: &str) {
    if val.starts_with('m') {
        cfg.format = OutputFormat::Mysql;
        cfg.delimiter = b',';
        cfg.do_quote = true;
        cfg.quote_char = b'"';
    } else if val.starts_with('s') {
        cfg.format = OutputFormat::Sqlite;
    } else {
        cfg.format = OutputFormat::Postgres;
        cfg.delimiter = b'\t';
        cfg.do_quote = false;
    }
}

fn parse_args(args: &[String]) -> EyreResult<Cli> {
    let trace = env::var_os("PARAM_DBG").is_some();
    let mut cli = Cli::default();
    let mut i = 0;

    while i < args.len() {
        let arg = &args[i];
        if trace {
            eprintln!("arg[{i}] = '{arg}'");
        }

        // Long options, with or without an attached =value.
        let (name, attached) = if let Some(body) = arg.strip_prefix("--") {
            match body.split_once('=') {
                Some((n, v)) => (n.to_string(), Some(v.to_string())),
                None => (body.to_string(), None),
            }
        } else if arg.starts_with('-') && arg.len() > 1 {
            let short = &arg[1..];
            let long = match short {
                "h" => "help",
                "d" => "debug",
                "v" => "verbose",
                "n" => "noop",
                "b" => "bundle",
                "c" => "chunk",
                "e" => "extnum",
                "E" => "extname",
                "i" => "input",
                "o" => "output",
                "r" => "rowrange",
                "s" => "select",
                "t" => "table",
                "B" => "binary",
                "C" => "concat",
                "H" => "noheader",
                "N" => "nostrip",
                "O" => "oid",
                "Q" => "noquote",
                "S" => "singlequote",
                "X" => "explode",
                "Z" => "noload",
                other => bail!("Invalid option '-{}'", other),
            };
            (long.to_string(), None)
        } else {
            cli.inputs.push(arg.clone());
            i += 1;
            continue;
        };

        let mut take_value = || -> EyreResult<String> {
            if let Some(v) = attached.clone() {
                return Ok(v);
            }
            i += 1;
            match args.get(i) {
                // A bare "-" is a legitimate value (stdout for --output).
                Some(v) if v == "-" || !v.starts_with('-') => Ok(v.clone()),
                _ => bail!("option '--{}' requires a value", name),
            }
        };

        let cfg = &mut cli.cfg;
        match name.as_str() {
            "help" => cli.show_help = true,
            "debug" => cfg.debug = true,
            "verbose" => cfg.verbose = true,
            "noop" => cli.noop = true,

            "bundle" => cfg.bundle = parse_usize("bundle", &take_value()?)?,
            "chunk" => cfg.chunk_size = Some(parse_usize("chunk", &take_value()?)?),
            "extnum" => cfg.extnum = Some(parse_usize("extnum", &take_value()?)?),
            "extname" => cfg.extname = Some(take_value()?),
            "input" => cli.input_opt = Some(take_value()?),
            "output" => cfg.output = Some(take_value()?),
            "rowrange" => cli.rowrange = Some(take_value()?),
            "select" => cli.select = Some(take_value()?),
            "table" => cfg.table_name = Some(take_value()?),

            "binary" => cfg.do_binary = true,
            "concat" => cfg.concat = true,
            "noheader" => cfg.header = false,
            "nostrip" => cfg.do_strip = false,
            // Accepted for compatibility; OIDs are never requested.
            "oid" => cfg.do_oids = false,
            "noquote" => cfg.do_quote = false,
            "singlequote" => cfg.quote_char = b'\'',
            "explode" => cfg.explode = true,
            "noload" => cfg.do_load = false,

            "asv" => cfg.delimiter = b' ',
            "bsv" => cfg.delimiter = b'|',
            "csv" => cfg.delimiter = b',',
            "tsv" => cfg.delimiter = b'\t',
            "ipac" => {
                cfg.delimiter = b'|';
                cfg.format = OutputFormat::Ipac;
            }

            "sql" => {
                let val = take_value()?;
                apply_sql_dialect(cfg, &val);
            }
            "drop" => {
                cfg.do_drop = true;
                cfg.do_create = true;
            }
            "create" => cfg.do_create = true,
            "truncate" => cfg.do_truncate = true,
            "sid" => cfg.sid_name = Some(take_value()?),
            "rid" => cfg.rid_name = Some(take_value()?),
            "add" => cfg.add_name = Some(take_value()?),
            "dbname" => cfg.dbname = Some(take_value()?),

            other => bail!("Invalid option '--{}'", other),
        }
        if trace {
            eprintln!("parsed option '{name}'");
        }
        i += 1;
    }

    Ok(cli)
}

fn run() -> i32 {
    let args: Vec<String> = env::args().skip(1).collect();

    let mut cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("fits2db: {e}");
            return 1;
        }
    };

    if cli.show_help {
        eprint!("{USAGE}");
        return 0;
    }

    if cli.cfg.debug {
        eprintln!(
            "create={} drop={} truncate={} binary={} explode={} concat={}",
            cli.cfg.do_create,
            cli.cfg.do_drop,
            cli.cfg.do_truncate,
            cli.cfg.do_binary,
            cli.cfg.explode,
            cli.cfg.concat
        );
        eprintln!(
            "extnum={:?} extname={:?} bundle={} table={:?}",
            cli.cfg.extnum, cli.cfg.extname, cli.cfg.bundle, cli.cfg.table_name
        );
        for (i, input) in cli.inputs.iter().enumerate() {
            eprintln!("in[{i}] = '{input}'");
        }
    }

    // The -i spelling contributes an input when no positionals were given.
    if cli.inputs.is_empty() {
        if let Some(input) = cli.input_opt.take() {
            cli.inputs.push(input);
        }
    }

    if cli.inputs.is_empty() {
        eprintln!("ERROR fits2db: no input files specified");
        return 2;
    }
    if cli.cfg.extnum.is_some() && cli.cfg.extname.is_some() {
        eprintln!("ERROR fits2db: only one of 'extname' or 'extnum' may be specified");
        return 3;
    }
    if cli.rowrange.is_some() {
        eprintln!("Warning: {}, skipping", Error::Unimplemented("the 'rowrange' option"));
        return 1;
    }
    if cli.select.is_some() {
        eprintln!("Warning: {}, skipping", Error::Unimplemented("the 'select' option"));
        return 1;
    }
    if cli.cfg.do_binary {
        // Binary COPY streams cannot span bundles.
        cli.cfg.bundle = 1;
    }

    if cli.noop {
        return 0;
    }

    match run_files(&cli.cfg, &cli.inputs) {
        Ok(()) => 0,
        Err(Error::OutputOpen(path, e)) => {
            eprintln!("ERROR fits2db: cannot open output '{path}': {e}");
            3
        }
        Err(e) => {
            eprintln!("ERROR fits2db: {e}");
            1
        }
    }
}

fn main() {
    process::exit(run());
}
