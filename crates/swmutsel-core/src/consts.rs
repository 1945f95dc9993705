/// Number of codons addressed by the 64x64 transition-matrix slot layout.
pub const CODON_COUNT: usize = 64;

/// Size of a full codon-by-codon matrix buffer.
pub const CODON_MATRIX_SIZE: usize = CODON_COUNT * CODON_COUNT;

/// Number of canonical amino acids.
pub const AMINO_ACID_COUNT: usize = 20;

/// Canonical amino-acid order used for fitness vectors and tie breaking.
pub const AMINO_ACIDS: &[u8; AMINO_ACID_COUNT] = b"ARNDCQEGHILKMFPSTWYV";

/// Nucleotide order used for codon indexing and the `pi` vector.
pub const NUCLEOTIDES: &[u8; 4] = b"TCAG";

/// Fitness values are searched within [-FITNESS_BOUND, FITNESS_BOUND].
pub const FITNESS_BOUND: f64 = 20.0;

/// Half-width of the interval used for random fitness restarts.
pub const RANDOM_START_RANGE: f64 = 3.0;

/// Initial simplex edge length for fitness searches.
pub const FITNESS_SIMPLEX_STEP: f64 = 1.0;

/// Score returned to the simplex for infeasible candidates. Finite on purpose.
pub const VERY_POOR_SCORE: f64 = 1e20;

/// Bounds for the univariate branch-length search.
pub const BRANCH_LENGTH_BOUNDS: (f64, f64) = (1e-7, 10.0);

/// Selection-coefficient magnitude beyond which the fixation kernel saturates.
pub const FIXATION_SATURATION: f64 = 1000.0;

/// Default scaling cadence (internal nodes) for conditional likelihood vectors.
pub const DEFAULT_SCALING_STEP: usize = 4;

/// Conditional vectors whose maximum falls below this are rescaled.
pub const DEFAULT_SCALING_THRESHOLD: f64 = 1e-20;

/// Tolerance on the nucleotide frequency sum before renormalising.
pub const PI_SUM_TOLERANCE: f64 = 1e-3;
