use super::super::args::*;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let global = cli.global;
    tracing::debug!(config = ?global.config, dir = ?global.dir, command = ?cli.cmd, "dispatching");
    match cli.cmd {
        Command::Stats(args) => super::stats::run(&global, args).await,
        Command::List(args) => super::entries::run(&global, args).await,
        Command::Fingerprint(args) => super::fingerprint::run(args),
        Command::Get(args) => super::get::run(&global, args).await,
        Command::Put(args) => super::put::run(&global, args).await,
        Command::Sweep => super::sweep::run(&global).await,
        Command::Clear(args) => super::clear::run(&global, args).await,
    }
}
