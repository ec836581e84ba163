//! IRF evaluation
//!
//! Loads a calibration directory and prints either a PSF containment table
//! over an energy grid or single IRF values.

use std::{path::PathBuf, time::Instant};

use indicatif::{ParallelProgressIterator, ProgressBar};
use lat_irfs::{
    AcceptanceCone, CacheConfig, CalibrationLoader, EventType, Evaluation, Irfs, SkyDir,
};
use rayon::prelude::*;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "irf-eval")]
struct Opt {
    /// Calibration directory
    #[structopt(parse(from_os_str))]
    path: PathBuf,
    /// Event type: front or back
    #[structopt(short, long, default_value = "front")]
    event_type: EventType,
    /// Interpolates the PSF between the 4 surrounding grid nodes
    #[structopt(long)]
    corners: bool,
    /// PSF integral cache settings (CSV)
    #[structopt(long, parse(from_os_str))]
    cache: Option<PathBuf>,
    /// Mission elapsed time [s]
    #[structopt(long)]
    time: Option<f64>,
    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// PSF containment radius and region of interest containment table
    Table {
        /// Inclination [deg]
        #[structopt(short, long, default_value = "30")]
        theta: f64,
        /// Containment fraction
        #[structopt(short, long, default_value = "0.68")]
        fraction: f64,
        /// Region of interest radius [deg]
        #[structopt(long, default_value = "5")]
        roi: f64,
        /// Source offset from the region of interest center [deg]
        #[structopt(long, default_value = "1")]
        offset: f64,
        /// Energy range [MeV]
        #[structopt(long, default_value = "30")]
        emin: f64,
        #[structopt(long, default_value = "300000")]
        emax: f64,
        /// Number of log-spaced energies
        #[structopt(short, long, default_value = "25")]
        n: usize,
    },
    /// Single IRF values
    Value {
        /// True energy [MeV]
        #[structopt(short, long)]
        energy: f64,
        /// Inclination [deg]
        #[structopt(short, long, default_value = "30")]
        theta: f64,
        /// Angular separation from the source [deg]
        #[structopt(short, long, default_value = "0.1")]
        separation: f64,
    },
}

fn containment_table(
    irfs: &Irfs,
    time: Option<f64>,
    theta: f64,
    fraction: f64,
    roi: f64,
    offset: f64,
    energies: Vec<f64>,
) -> anyhow::Result<()> {
    let psf = irfs.psf().get(time)?;
    let center = SkyDir::from_radec(0., 0.);
    let cone = AcceptanceCone::new(center, roi)?;
    let src_dir = SkyDir::from_radec(offset, 0.);

    let now = Instant::now();
    let pb = ProgressBar::new(energies.len() as u64);
    let rows = energies
        .into_par_iter()
        .progress_with(pb)
        .map_with(psf.clone(), |psf, energy| -> anyhow::Result<(f64, f64, f64)> {
            let radius = psf.angular_containment(energy, theta, 0., fraction)?;
            let roi_fraction =
                psf.angular_integral_cones(energy, &src_dir, theta, 0., &[cone])?;
            Ok((energy, radius, roi_fraction))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    log::info!("Containment table computed in {}ms", now.elapsed().as_millis());

    println!(
        "{:>12} {:>12} {:>12}",
        "E [MeV]",
        format!("R{:.0} [deg]", fraction * 100.),
        "ROI frac."
    );
    for (energy, radius, roi_fraction) in rows {
        println!("{:>12.2} {:>12.4} {:>12.6}", energy, radius, roi_fraction);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let evaluation = if opt.corners {
        Evaluation::Corners
    } else {
        Evaluation::Nearest
    };
    let irfs = CalibrationLoader::new(&opt.path)
        .event_type(opt.event_type)
        .evaluation(evaluation)
        .cache_config(match &opt.cache {
            Some(path) => CacheConfig::from_csv(path)?,
            None => CacheConfig::default(),
        })
        .load()?;

    match opt.cmd {
        Command::Table {
            theta,
            fraction,
            roi,
            offset,
            emin,
            emax,
            n,
        } => {
            anyhow::ensure!(n > 1, "at least 2 energies are required");
            anyhow::ensure!(emin > 0. && emax > emin, "invalid energy range");
            let (lo, hi) = (emin.log10(), emax.log10());
            let energies: Vec<f64> = (0..n)
                .map(|i| 10f64.powf(lo + (hi - lo) * i as f64 / (n - 1) as f64))
                .collect();
            containment_table(&irfs, opt.time, theta, fraction, roi, offset, energies)?;
        }
        Command::Value {
            energy,
            theta,
            separation,
        } => {
            let time = opt.time;
            println!("IRFs           : {}", irfs.event_type());
            println!(
                "Aeff           : {:.3}cm^2",
                irfs.effective_area(energy, theta, 0., time)?
            );
            println!(
                "PSF            : {:.6e}/sr",
                irfs.psf_value(separation, energy, theta, 0., time)?
            );
            println!(
                "PSF R68        : {:.4}deg",
                irfs.psf_containment_radius(energy, theta, 0., 0.68, time)?
            );
            println!(
                "PSF R95        : {:.4}deg",
                irfs.psf_containment_radius(energy, theta, 0., 0.95, time)?
            );
            println!(
                "Edisp [E/2,2E] : {:.6}",
                irfs.edisp_integral(energy / 2., energy * 2., energy, theta, 0., time)?
            );
            println!(
                "<E'>           : {:.3}MeV",
                irfs.mean_app_energy(energy, theta, 0., time)?
            );
        }
    }
    Ok(())
}
