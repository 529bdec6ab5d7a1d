use std::{ env, fs, path::PathBuf };
use anyhow::Context;
use exact_hubbard::{
    config::Config,
    correlators::Correlators,
    hilbert::fock_basis,
    io::{ save_correlators, save_npz, save_spectrum },
    spectrum::Spectrum,
};

const USAGE: &str = "usage: exact_hubbard [CONFIG] [OUTDIR]";

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let config = match args.next() {
        Some(arg) if arg == "-h" || arg == "--help" => {
            println!("{}", USAGE);
            return Ok(());
        },
        Some(path) => Config::load(&path)
            .with_context(|| format!("failed to load config from {}", path))?,
        None => {
            log::info!("no config given; using the default triangle");
            Config::triangle()
        },
    };
    let outdir = PathBuf::from(args.next().unwrap_or_else(|| "output".into()));
    if args.next().is_some() { anyhow::bail!(USAGE); }
    fs::create_dir_all(&outdir)
        .with_context(|| format!("failed to create {}", outdir.display()))?;

    let params = config.params();
    println!(
        "nsites = {}, kappa = {}, U = {}, beta = {}, nt = {}",
        config.nsites(), params.kappa, params.U, params.beta, params.nt,
    );

    let basis = fock_basis(config.nsites());
    let spectrum = Spectrum::compute(&config, &basis)?;
    println!("ground state energy: {}", spectrum.ground_energy());
    for (q, levels) in spectrum.levels(8).iter() {
        log::debug!("charge {}: {:?}", q, levels);
    }
    save_spectrum(outdir.join("spectrum.dat"), &spectrum)?;

    let correlators = Correlators::compute(&config, &spectrum);
    save_correlators(outdir.join("correlators.dat"), &config, &correlators)?;
    let projector = config.lattice().hopping_irreps(params.kappa)
        .context("failed to diagonalize the hopping matrix")?;
    let irreps = correlators.project(&projector);
    save_npz(
        outdir.join("results.npz"), &config, &spectrum, &correlators, &irreps)?;

    println!("done");
    Ok(())
}
