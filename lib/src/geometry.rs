use nalgebra::{Point2, Point3};

// cartesian and geodetic accessor traits for nalgebra wrappers

pub trait CartesianXY {
    fn x(&self) -> f64;
    fn y(&self) -> f64;
}

pub trait CartesianZ: CartesianXY {
    fn z(&self) -> f64;
}

/// Longitude and latitude, both in radians.
pub trait GeodeticLatLon {
    fn lat(&self) -> f64;
    fn lon(&self) -> f64;
}

pub trait GeodeticHeight: GeodeticLatLon {
    fn height(&self) -> f64;
}

// nalgebra Wrappers

/// Earth-centred, earth-fixed position in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ECEFPoint3(pub Point3<f64>);

impl ECEFPoint3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        ECEFPoint3(Point3::new(x, y, z))
    }

    /// Convert to geodetic coordinates.
    /// Rey-Jer You non-iterative method with a single correction step
    pub fn to_geodetic(&self, ellipsoid: &Ellipsoid) -> GeodeticPoint3 {
        let (x, y, z) = (self.x(), self.y(), self.z());

        let major = ellipsoid.semi_major_axis;
        let minor = ellipsoid.semi_minor_axis;
        let q = (x * x + y * y).sqrt();

        // on the polar axis beta is exactly +/- 90 degrees
        if q == 0.0 {
            let lat = if z < 0.0 {
                -std::f64::consts::FRAC_PI_2
            } else {
                std::f64::consts::FRAC_PI_2
            };
            return GeodeticPoint3::new(0.0, lat, z.abs() - minor);
        }

        let r = (x * x + y * y + z * z).sqrt();
        let e = (major * major - minor * minor).sqrt();
        let var = r * r - e * e;
        let u = (0.5 * var + 0.5 * (var * var + 4.0 * e * e * z * z).sqrt()).sqrt();

        let hu_e = (u * u + e * e).sqrt();
        let mut beta = (hu_e / u * z / q).atan();

        let eps = ((minor * u - major * hu_e + e * e) * beta.sin())
            / (major * hu_e / beta.cos() - e * e * beta.cos());
        beta += eps;

        let lat = (major / minor * beta.tan()).atan();
        let lon = y.atan2(x);

        let v1 = z - minor * beta.sin();
        let v2 = q - major * beta.cos();

        let inside =
            (x * x / major / major) + (y * y / major / major) + (z * z / minor / minor) < 1.0;
        let height = if inside {
            -(v1 * v1 + v2 * v2).sqrt()
        } else {
            (v1 * v1 + v2 * v2).sqrt()
        };

        GeodeticPoint3::new(lon, lat, height)
    }
}

impl CartesianXY for ECEFPoint3 {
    fn x(&self) -> f64 {
        self.0.x
    }

    fn y(&self) -> f64 {
        self.0.y
    }
}

impl CartesianZ for ECEFPoint3 {
    fn z(&self) -> f64 {
        self.0.z
    }
}

/// Geodetic position: x = longitude, y = latitude (radians), z = height above
/// the ellipsoid in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeodeticPoint3(pub Point3<f64>);

impl GeodeticPoint3 {
    pub fn new(lon: f64, lat: f64, height: f64) -> Self {
        GeodeticPoint3(Point3::new(lon, lat, height))
    }

    pub fn from_degrees(lon: f64, lat: f64, height: f64) -> Self {
        GeodeticPoint3::new(lon.to_radians(), lat.to_radians(), height)
    }

    pub fn to_degrees(&self) -> GeodeticPoint3 {
        GeodeticPoint3::new(self.lon().to_degrees(), self.lat().to_degrees(), self.height())
    }

    pub fn horizontal(&self) -> GeodeticPoint2 {
        GeodeticPoint2::new(self.lon(), self.lat())
    }

    pub fn with_height(&self, height: f64) -> GeodeticPoint3 {
        GeodeticPoint3::new(self.lon(), self.lat(), height)
    }

    pub fn to_ecef(&self, ellipsoid: &Ellipsoid) -> ECEFPoint3 {
        let lat = self.lat();
        let lon = self.lon();
        let height = self.height();

        let e2 = ellipsoid.eccentricity_squared;

        // Radius of curvature in the prime vertical
        let n = ellipsoid.semi_major_axis / (1.0 - e2 * lat.sin().powi(2)).sqrt();

        let x = (n + height) * lat.cos() * lon.cos();
        let y = (n + height) * lat.cos() * lon.sin();
        let z = (n * (1.0 - e2) + height) * lat.sin();

        ECEFPoint3::new(x, y, z)
    }
}

impl GeodeticLatLon for GeodeticPoint3 {
    fn lat(&self) -> f64 {
        self.0.y
    }

    fn lon(&self) -> f64 {
        self.0.x
    }
}

impl GeodeticHeight for GeodeticPoint3 {
    fn height(&self) -> f64 {
        self.0.z
    }
}

/// Horizontal geodetic position: x = longitude, y = latitude (radians)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GeodeticPoint2(pub Point2<f64>);

impl GeodeticPoint2 {
    pub fn new(lon: f64, lat: f64) -> Self {
        GeodeticPoint2(Point2::new(lon, lat))
    }

    pub fn from_degrees(lon: f64, lat: f64) -> Self {
        GeodeticPoint2::new(lon.to_radians(), lat.to_radians())
    }

    pub fn to_degrees(&self) -> GeodeticPoint2 {
        GeodeticPoint2::new(self.lon().to_degrees(), self.lat().to_degrees())
    }
}

impl GeodeticLatLon for GeodeticPoint2 {
    fn lat(&self) -> f64 {
        self.0.y
    }

    fn lon(&self) -> f64 {
        self.0.x
    }
}

// Rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub lower_left: Point2<f64>,
    pub upper_right: Point2<f64>,
}

impl Rectangle {
    pub fn contains(&self, point: &Point2<f64>) -> bool {
        point.x >= self.lower_left.x
            && point.x <= self.upper_right.x
            && point.y >= self.lower_left.y
            && point.y <= self.upper_right.y
    }
}

/// Geodetic bounds of a tile, radians.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GeodeticRectangle {
    pub lower_left: GeodeticPoint2,
    pub upper_right: GeodeticPoint2,
}

impl GeodeticRectangle {
    pub fn width(&self) -> f64 {
        self.upper_right.lon() - self.lower_left.lon()
    }

    pub fn height(&self) -> f64 {
        self.upper_right.lat() - self.lower_left.lat()
    }

    /// (west, south, east, north) in degrees
    pub fn to_degrees(&self) -> (f64, f64, f64, f64) {
        (
            self.lower_left.lon().to_degrees(),
            self.lower_left.lat().to_degrees(),
            self.upper_right.lon().to_degrees(),
            self.upper_right.lat().to_degrees(),
        )
    }

    pub fn contains(&self, point: &GeodeticPoint2) -> bool {
        point.lon() >= self.lower_left.lon()
            && point.lon() <= self.upper_right.lon()
            && point.lat() >= self.lower_left.lat()
            && point.lat() <= self.upper_right.lat()
    }
}

// Triangle

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub vertices: [Point2<f64>; 3],
}

impl Triangle {
    pub fn bounding_rect(&self) -> Rectangle {
        // componentwise evaluation of the triangle bounding box
        let (mut lower_left, mut upper_right) = self.vertices[0].inf_sup(&self.vertices[1]);
        lower_left = lower_left.inf(&self.vertices[2]);
        upper_right = upper_right.sup(&self.vertices[2]);

        Rectangle {
            lower_left,
            upper_right,
        }
    }
}

/// Ellipsoids
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    pub semi_major_axis: f64, // equatorial radius in metres
    pub semi_minor_axis: f64, // polar radius in metres
    pub flattening: f64,
    pub eccentricity_squared: f64,
}

impl Ellipsoid {
    /// Create a WGS-84 Ellipsoid
    pub fn wgs84() -> Self {
        let semi_major_axis = 6378137.0;
        let flattening = 1.0 / 298.257223563;
        let semi_minor_axis = semi_major_axis * (1.0 - flattening);
        let eccentricity_squared = flattening * (2.0 - flattening);

        Self {
            semi_major_axis,
            semi_minor_axis,
            flattening,
            eccentricity_squared,
        }
    }
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Self::wgs84()
    }
}

// Linear interpolation
pub fn lerp(min_value: f64, max_value: f64, t: f64) -> f64 {
    min_value + t * (max_value - min_value)
}
