//! this binary starts the studentdb server
//! to see the list of commands, type: `studentdb-server --help`

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::exit;
use clap::{crate_version, App, Arg, arg_enum, value_t};
use studentdb::{
    NaiveThreadPool, RayonThreadPool, Result, SharedQueueThreadPool, SledStore, SqliteStore,
    StudentDbError, StudentServer, StudentStore, ThreadPool,
};
use tracing::{warn, info, Level};
use tracing_subscriber::{FmtSubscriber};

arg_enum! {
    #[allow(non_camel_case_types)]
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    enum Engine {
        sqlite,
        sled
    }
}

arg_enum! {
    #[allow(non_camel_case_types)]
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    enum Pool {
        naive,
        shared,
        rayon
    }
}

const DEFAULT_ADDRESS: &str = "127.0.0.1:4000";
// the name of the file, kept in the data dir, that records the engine in use
const ENGINE_FILE: &str = "engine";


/// ['Opt'] holds parsed and validated options from the command line
#[derive(Debug)]
struct Opt {
    addr: SocketAddr,
    engine: Engine,
    data_dir: PathBuf,
    pool: Pool,
    threads: u32,
}

impl Opt {
    /// validates the `addr`, `threads` and `req_engine` parameters
    /// returns `Ok<Opt>` if everything is valid
    /// # Errors
    /// returns [`StudentDbError::Parsing`] if one of the parameters is invalid
    ///
    fn build(addr: &str, req_engine: Engine, data_dir: PathBuf, pool: Pool, threads: &str) -> Result<Opt> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| StudentDbError::Parsing(format!("could not parse {} into an IP address and port", &addr)))?;

        let threads: u32 = threads
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| StudentDbError::Parsing(format!("{} is not a valid number of threads", threads)))?;

        // the requested engine must be the same as the engine the data dir was created with
        let engine = match current_engine(&data_dir)? {
            None => req_engine, // no current engine, use the requested engine
            Some(cur_engine) if req_engine == cur_engine => cur_engine,
            Some(cur_engine) => return Err(StudentDbError::Parsing(format!(
                "the requested engine: {} does not match the engine currently in use: {}",
                req_engine, cur_engine
            ))),
        };

        Ok(Opt { addr, engine, data_dir, pool, threads })
    }
}


fn main() {
    let default_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .to_string();

    // parse command line args
    let matches = App::new("studentdb-server")
        .version(crate_version!())
        .author("strohs <strohs1@gmail.com>")
        .about("serves students, courses and grades to studentdb clients")
        .arg(Arg::with_name("addr")
            .long("addr")
            .value_name("IP_ADDR:PORT")
            .help("sets the IP_ADDR:PORT that the server listens on")
            .default_value(DEFAULT_ADDRESS))
        .arg(Arg::with_name("engine")
            .long("engine")
            .value_name("ENGINE_NAME")
            .help("sets the storage engine to use")
            .possible_values(&Engine::variants())
            .default_value("sqlite"))
        .arg(Arg::with_name("data-dir")
            .long("data-dir")
            .value_name("DIR")
            .help("sets the directory the store keeps its data in")
            .default_value("."))
        .arg(Arg::with_name("pool")
            .long("pool")
            .value_name("POOL")
            .help("sets the thread pool that serves client connections")
            .possible_values(&Pool::variants())
            .default_value("shared"))
        .arg(Arg::with_name("threads")
            .long("threads")
            .value_name("N")
            .help("sets the number of threads in the pool")
            .default_value(&default_threads))
        .arg(Arg::with_name("log-level")
            .long("log-level")
            .value_name("LEVEL")
            .help("sets the most verbose level that is logged to STDERR")
            .possible_values(&["error", "warn", "info", "debug", "trace"])
            .default_value("info"))
        .get_matches();

    // set up a tracing subscriber to log to STDERR
    subscriber_config(matches.value_of("log-level").unwrap_or("info"));

    // validate command line options, store them in Opt
    let opt = match Opt::build(
        matches.value_of("addr").unwrap_or(DEFAULT_ADDRESS),
        value_t!(matches, "engine", Engine).unwrap_or(Engine::sqlite),
        PathBuf::from(matches.value_of("data-dir").unwrap_or(".")),
        value_t!(matches, "pool", Pool).unwrap_or(Pool::shared),
        matches.value_of("threads").unwrap_or(&default_threads),
    ) {
        Ok(opt) => opt,
        Err(err) => {
            eprintln!("{}", err);
            exit(1);
        }
    };

    // start the server
    if let Err(e) = run(opt) {
        eprintln!("{}", e);
        exit(1);
    }
}


fn run(opt: Opt) -> Result<()> {
    info!("studentdb-server {}", env!("CARGO_PKG_VERSION"));
    info!("Storage engine: {}", opt.engine);
    info!("Thread pool: {} with {} threads", opt.pool, opt.threads);
    info!("Listening on {}", opt.addr);

    // write engine to engine file
    fs::create_dir_all(&opt.data_dir)?;
    fs::write(opt.data_dir.join(ENGINE_FILE), format!("{}", opt.engine))?;

    match opt.engine {
        Engine::sqlite => run_with_store(SqliteStore::open(&opt.data_dir)?, &opt),
        Engine::sled => run_with_store(SledStore::open(&opt.data_dir)?, &opt),
    }
}

fn run_with_store<S: StudentStore>(store: S, opt: &Opt) -> Result<()> {
    match opt.pool {
        Pool::naive => run_with_pool(store, NaiveThreadPool::new(opt.threads)?, opt.addr),
        Pool::shared => run_with_pool(store, SharedQueueThreadPool::new(opt.threads)?, opt.addr),
        Pool::rayon => run_with_pool(store, RayonThreadPool::new(opt.threads)?, opt.addr),
    }
}

fn run_with_pool<S: StudentStore, P: ThreadPool>(store: S, pool: P, addr: SocketAddr) -> Result<()> {
    let server = StudentServer::new(store, pool);
    server.run(addr)
}

/// determines if there is an "engine" file in `data_dir` and returns the value of that file, else None
///
/// returns `Ok(None)` if an "engine" file does not (yet) exist, `Some(Engine)`
/// if the engine file exists and was parsed successfully
///
fn current_engine(data_dir: &Path) -> Result<Option<Engine>> {
    let engine = data_dir.join(ENGINE_FILE);
    if !engine.exists() {
        return Ok(None);
    }

    match fs::read_to_string(engine)?.trim().parse() {
        Ok(engine) => Ok(Some(engine)),
        Err(e) => {
            // file is corrupted or invalid contents
            warn!("The content of the engine file is invalid: {}", e);
            Ok(None)
        }
    }
}

/// configures a tracing subscriber that will log to STDERR
fn subscriber_config(level: &str) {
    let subscriber = FmtSubscriber::builder()
        // events at `level` or higher (e.g, warn, error) will be written
        .with_max_level(level.parse().unwrap_or(Level::INFO))
        // log to stderr instead of stdout
        .with_writer(std::io::stderr)
        // completes the builder.
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting tracing default subscriber failed");
}
