//! Geodesic distance on the WGS-84 ellipsoid.
//!
//! Uses Vincenty's inverse formula. For nearly antipodal points the
//! iteration may not converge; those fall back to the haversine distance
//! on the mean Earth radius.

use std::cmp::Ordering;

use super::Coordinates;

/// Distance function injected into the distance service.
pub type DistanceFn = fn(&Coordinates, &Coordinates) -> f64;

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const WGS84_B: f64 = WGS84_A * (1.0 - WGS84_F);
const MEAN_EARTH_RADIUS_KM: f64 = 6_371.008_8;

const MAX_ITERATIONS: usize = 200;
const CONVERGENCE: f64 = 1e-12;

/// Geodesic distance in kilometers, rounded to 2 decimal places.
pub fn geodesic_km(a: &Coordinates, b: &Coordinates) -> f64 {
    // Evaluate in a fixed argument order so the result is exactly symmetric.
    let (first, second) = if cmp_coordinates(a, b) == Ordering::Greater {
        (b, a)
    } else {
        (a, b)
    };

    let km = match vincenty_meters(first, second) {
        Some(meters) => meters / 1000.0,
        None => {
            tracing::debug!(
                from = %first,
                to = %second,
                "Vincenty did not converge, using haversine"
            );
            haversine_unrounded_km(first, second)
        }
    };

    round_km(km)
}

/// Great-circle distance on a sphere, rounded to 2 decimal places.
pub fn haversine_km(a: &Coordinates, b: &Coordinates) -> f64 {
    round_km(haversine_unrounded_km(a, b))
}

fn round_km(km: f64) -> f64 {
    (km * 100.0).round() / 100.0
}

fn cmp_coordinates(a: &Coordinates, b: &Coordinates) -> Ordering {
    a.latitude
        .total_cmp(&b.latitude)
        .then(a.longitude.total_cmp(&b.longitude))
}

fn haversine_unrounded_km(a: &Coordinates, b: &Coordinates) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * MEAN_EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Vincenty inverse solution. Returns `None` when the iteration fails to converge.
fn vincenty_meters(a: &Coordinates, b: &Coordinates) -> Option<f64> {
    let l = (b.longitude - a.longitude).to_radians();
    let u1 = ((1.0 - WGS84_F) * a.latitude.to_radians().tan()).atan();
    let u2 = ((1.0 - WGS84_F) * b.latitude.to_radians().tan()).atan();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    for _ in 0..MAX_ITERATIONS {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let sin_sigma = ((cos_u2 * sin_lambda).powi(2)
            + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2))
        .sqrt();
        if sin_sigma == 0.0 {
            // coincident points
            return Some(0.0);
        }

        let cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        let sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        // equatorial line: cos_sq_alpha == 0
        let cos_2sigma_m = if cos_sq_alpha != 0.0 {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        } else {
            0.0
        };
        let c = WGS84_F / 16.0 * cos_sq_alpha * (4.0 + WGS84_F * (4.0 - 3.0 * cos_sq_alpha));

        let previous = lambda;
        lambda = l
            + (1.0 - c)
                * WGS84_F
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));

        if (lambda - previous).abs() < CONVERGENCE {
            let u_sq = cos_sq_alpha * (WGS84_A * WGS84_A - WGS84_B * WGS84_B) / (WGS84_B * WGS84_B);
            let big_a =
                1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
            let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
            let delta_sigma = big_b
                * sin_sigma
                * (cos_2sigma_m
                    + big_b / 4.0
                        * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)
                            - big_b / 6.0
                                * cos_2sigma_m
                                * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                                * (-3.0 + 4.0 * cos_2sigma_m * cos_2sigma_m)));

            return Some(WGS84_B * big_a * (sigma - delta_sigma));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn london() -> Coordinates {
        Coordinates::new(51.5074, -0.1278)
    }

    fn paris() -> Coordinates {
        Coordinates::new(48.8566, 2.3522)
    }

    #[test]
    fn test_same_point_is_zero() {
        for point in [london(), paris(), Coordinates::UNKNOWN, Coordinates::new(-89.9, 179.9)] {
            assert_eq!(geodesic_km(&point, &point), 0.0);
        }
    }

    #[test]
    fn test_symmetry() {
        let points = [
            london(),
            paris(),
            Coordinates::new(-33.8688, 151.2093),
            Coordinates::new(40.7128, -74.006),
            Coordinates::new(0.0, 0.0),
            Coordinates::new(0.5, 179.7),
        ];
        for a in &points {
            for b in &points {
                assert_eq!(geodesic_km(a, b), geodesic_km(b, a), "{a} <-> {b}");
            }
        }
    }

    #[test]
    fn test_one_degree_along_equator() {
        let d = geodesic_km(&Coordinates::new(0.0, 0.0), &Coordinates::new(0.0, 1.0));
        assert_eq!(d, 111.32);
    }

    #[test]
    fn test_london_paris() {
        let d = geodesic_km(&london(), &paris());
        assert!((343.0..345.0).contains(&d), "got {d}");
    }

    #[test]
    fn test_rounded_to_two_decimals() {
        let d = geodesic_km(&london(), &Coordinates::new(40.7128, -74.006));
        assert_eq!(d, (d * 100.0).round() / 100.0);
    }

    #[test]
    fn test_antipodal_falls_back() {
        let d = geodesic_km(&Coordinates::new(0.0, 0.0), &Coordinates::new(0.5, 179.7));
        assert!(d > 19_000.0 && d < 20_100.0, "got {d}");
    }

    #[test]
    fn test_haversine_close_to_geodesic() {
        let spherical = haversine_km(&london(), &paris());
        let ellipsoidal = geodesic_km(&london(), &paris());
        assert!((spherical - ellipsoidal).abs() < 2.0);
    }
}
