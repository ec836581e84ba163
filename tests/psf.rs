use std::f64::consts::{FRAC_PI_2, PI};

use approx::assert_relative_eq;
use lat_irfs::{
    psf::{PsfScaling, PAR_NAMES, THRESHOLD_ENERGY},
    table::ParameterSet,
    AcceptanceCone, CacheConfig, EventType, GridTable, KingPsf, Psf, Quadrature, SkyDir,
};

/// PSF parameters varying with energy over 30MeV-300GeV and cos(theta) in
/// [0.2,1]
fn king_psf(event_type: EventType) -> KingPsf {
    let ebounds = [30., 100., 300., 1e3, 3e3, 1e4, 3e4, 1e5, 3e5];
    let tbounds = [0.2, 0.6, 1.];
    let ne = ebounds.len() - 1;
    let nt = tbounds.len() - 1;
    let base = [0.4, 0.3, 0.5, 1.2, 2.2, 2.8];
    let tables = base
        .iter()
        .enumerate()
        .map(|(k, &v)| {
            let values = (0..nt * ne)
                .map(|i| v * (1. + 0.02 * (k as f64) * (i % ne) as f64 / ne as f64))
                .collect();
            GridTable::new(
                &ebounds[..ne],
                &ebounds[1..],
                &tbounds[..nt],
                &tbounds[1..],
                values,
            )
            .unwrap()
        })
        .collect();
    let pars =
        ParameterSet::new(PAR_NAMES.iter().map(|n| n.to_string()).collect(), tables).unwrap();
    KingPsf::new(
        &pars,
        PsfScaling::new((0.058, 0.000377), (0.0964, 0.0013), -0.8),
        event_type,
    )
    .unwrap()
}

fn psf() -> Psf {
    Psf::new(
        king_psf(EventType::Front),
        CacheConfig::default().n_offsets(121).n_widths(25),
    )
    .unwrap()
}

#[test]
fn unit_normalization() {
    let quadrature = Quadrature::new(1e-8);
    let breaks = [0., 1e-4, 1e-3, 1e-2, 0.1, 1., FRAC_PI_2];
    for event_type in [EventType::Front, EventType::Back] {
        let psf = Psf::from(king_psf(event_type));
        for energy in [35., 60., 110., 130., 1e3, 2e4, 2e5] {
            for theta in [10., 45., 75.] {
                // numerical normalization is over the sphere, the closed form
                // in the small angle approximation
                let total = quadrature
                    .integrate_with_breaks(
                        |t: f64| {
                            let measure = if energy < THRESHOLD_ENERGY {
                                t.sin()
                            } else {
                                t
                            };
                            psf.value(t.to_degrees(), energy, theta, 0.).unwrap() * measure
                        },
                        &breaks,
                    )
                    .unwrap();
                assert_relative_eq!(2. * PI * total, 1., max_relative = 1e-5);
            }
        }
    }
}

#[test]
fn angular_integral_is_monotonic() {
    let psf = psf();
    for energy in [50., 1e3, 1e5] {
        assert_eq!(psf.angular_integral(energy, 20., 0., 0.).unwrap(), 0.);
        let mut last = 0.;
        for radius in [1e-3, 0.01, 0.05, 0.1, 0.3, 1., 3., 10., 30., 60., 80., 90.] {
            let value = psf.angular_integral(energy, 20., 0., radius).unwrap();
            assert!(value >= last, "{energy}MeV: {value} < {last} at {radius}deg");
            last = value;
        }
        assert_relative_eq!(last, 1., max_relative = 1e-5);
    }
}

#[test]
fn containment_is_idempotent() {
    let mut psf = psf();
    let cone = AcceptanceCone::new(SkyDir::from_radec(120., -30.), 10.).unwrap();
    // numerical normalization below the threshold, closed form above
    for energy in [50., 1e3] {
        let a = psf.containment(2., energy, 0.8, &cone).unwrap();
        let cache_calls = psf.cache().unwrap().evaluations();
        let king_calls = psf.king().quadrature().calls();
        let b = psf.containment(2., energy, 0.8, &cone).unwrap();
        assert_eq!(a, b);
        assert_eq!(psf.cache().unwrap().evaluations(), cache_calls, "{energy}MeV");
        assert_eq!(psf.king().quadrature().calls(), king_calls, "{energy}MeV");
    }
}

#[test]
fn cone_change_invalidates_cache() {
    let mut psf = psf();
    let center = SkyDir::from_radec(120., -30.);
    let cone = AcceptanceCone::new(center, 10.).unwrap();
    let a = psf.containment(2., 1e3, 0.8, &cone).unwrap();
    let n_ready = psf.cache().unwrap().n_ready();
    assert!(n_ready > 0);

    let same = AcceptanceCone::new(SkyDir::from_radec(120., -30. + 1e-5), 10. + 5e-6).unwrap();
    let calls = psf.cache().unwrap().evaluations();
    assert_eq!(psf.containment(2., 1e3, 0.8, &same).unwrap(), a);
    assert_eq!(psf.cache().unwrap().evaluations(), calls);

    let wider = AcceptanceCone::new(center, 10. + 2e-5).unwrap();
    psf.containment(2., 1e3, 0.8, &wider).unwrap();
    assert!(psf.cache().unwrap().evaluations() > calls);
    assert_eq!(psf.cache().unwrap().cone(), &wider);

    let calls = psf.cache().unwrap().evaluations();
    let moved = AcceptanceCone::new(SkyDir::from_radec(120., -29.8), 10. + 2e-5).unwrap();
    let b = psf.containment(2., 1e3, 0.8, &moved).unwrap();
    assert!(psf.cache().unwrap().evaluations() > calls);
    assert_relative_eq!(a, b, max_relative = 1e-2);
}

#[test]
fn roi_scenario() {
    let mut psf = psf();
    let center = SkyDir::from_radec(0., 0.);
    let cone = AcceptanceCone::new(center, 10.).unwrap();
    let (energy, theta) = (1e3, 0.8f64.acos().to_degrees());
    let centered = psf
        .angular_integral_cones(energy, &center, theta, 0., &[cone])
        .unwrap();
    let expected = psf.angular_integral(energy, theta, 0., 10.).unwrap();
    assert_relative_eq!(centered, expected, max_relative = 1e-2);
    assert!(centered > 0.99);

    let near_edge = psf
        .angular_integral_cones(energy, &SkyDir::from_radec(10., 0.), theta, 0., &[cone])
        .unwrap();
    assert!(near_edge > 0.3 && near_edge < 0.7, "{near_edge}");

    let far = psf
        .angular_integral_cones(energy, &SkyDir::from_radec(45., 0.), theta, 0., &[cone])
        .unwrap();
    assert!(far < 1e-4, "{far}");
}
