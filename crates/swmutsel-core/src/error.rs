use thiserror::Error;

#[derive(Error, Debug)]
pub enum SelError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV Parsing Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Parse error in {source_name} (line {line}): {message}")]
    Parse {
        source_name: String,
        line: usize,
        message: String,
    },

    #[error("Taxon '{0}' is in the tree but not in the alignment")]
    TaxonMismatch(String),

    #[error("Tree error: {0}")]
    Tree(String),

    #[error("Eigendecomposition failed to converge (matrix size {matrix_size})")]
    EigenDecomposition { matrix_size: usize },

    #[error("Root likelihood is zero")]
    ZeroLikelihood,

    #[error("Clades '{parent}' and '{child}' share no codon states")]
    DisjointCladeStates { parent: String, child: String },

    #[error("Optimizer error: {0}")]
    Optimizer(String),

    #[error("Site {site}: {source}")]
    Site {
        site: usize,
        #[source]
        source: Box<SelError>,
    },

    #[error("Branch {node}: {source}")]
    Branch {
        node: usize,
        #[source]
        source: Box<SelError>,
    },

    #[error("Worker {worker}: {message}")]
    Remote { worker: String, message: String },
}

impl SelError {
    pub fn at_site(self, site: usize) -> Self {
        match self {
            e @ SelError::Site { .. } => e,
            other => SelError::Site {
                site,
                source: Box::new(other),
            },
        }
    }

    pub fn at_branch(self, node: usize) -> Self {
        match self {
            e @ (SelError::Branch { .. } | SelError::Remote { .. }) => e,
            other => SelError::Branch {
                node,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, looking through site and branch context.
    pub fn root_cause(&self) -> &SelError {
        match self {
            SelError::Site { source, .. } | SelError::Branch { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn is_zero_likelihood(&self) -> bool {
        matches!(self.root_cause(), SelError::ZeroLikelihood)
    }
}

pub type SelResult<T> = Result<T, SelError>;
