//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Option value conventions shared by the form, the reconciler and the deriver
pub mod options {
    /// Sentinel shown in generated controls meaning "use the tool default"
    pub const DEFAULT_SENTINEL: &str = "Default";

    /// Canonical boolean spellings used for display binding and on the wire
    pub const TRUE: &str = "true";
    pub const FALSE: &str = "false";

    /// Separator used when a string-list option is sent to the service
    pub const LIST_SEPARATOR: char = ',';
}

/// Durable key-value store keys
pub mod storage {
    /// Key holding the raw editor text
    pub const SOURCE_KEY: &str = "sourceCode";

    /// Key holding `{"version": .., "options": {..}}`
    pub const OPTIONS_KEY: &str = "options";

    /// File name of the file-backed store inside the data directory
    pub const STATE_FILENAME: &str = "state.json";
}

/// Settings file location and defaults
pub mod config {
    /// Directory name under the platform config/data dirs
    pub const APP_DIR: &str = "clang-format-configurator";

    /// Settings file name
    pub const FILENAME: &str = "settings.json";

    pub const DEFAULT_SERVER_URL: &str = "http://localhost";
    pub const DEFAULT_PORT: u16 = 8037;
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Environment overrides
    pub const ENV_SERVER_URL: &str = "CLANG_FORMAT_URL";
    pub const ENV_PORT: &str = "CLANG_FORMAT_PORT";
}

/// Settings validation ranges
pub mod validation {
    pub const MIN_TIMEOUT_SECS: u64 = 1;
    pub const MAX_TIMEOUT_SECS: u64 = 300;
    pub const MIN_WINDOW_DIMENSION: u16 = 400;
    pub const MAX_WINDOW_DIMENSION: u16 = 8192;
}

/// Remote service endpoints
pub mod service {
    pub const DOC_PATH: &str = "/doc";
    pub const FORMAT_PATH: &str = "/format";
}

/// Editor presentation derived from the active config
pub mod editor {
    /// Used when `TabWidth` is not set
    pub const DEFAULT_TAB_WIDTH: usize = 2;

    /// Used when `ColumnLimit` is not set
    pub const DEFAULT_COLUMN_LIMIT: usize = 80;

    pub const TAB_WIDTH_OPTION: &str = "TabWidth";
    pub const COLUMN_LIMIT_OPTION: &str = "ColumnLimit";
}

/// Export file conventions
pub mod export {
    /// File name used when no explicit export path is given
    pub const DEFAULT_FILENAME: &str = ".clang-format";

    pub const DOCUMENT_START: &str = "---\n";
    pub const DOCUMENT_END: &str = "\n...\n";
}

/// Source shown in the editor when nothing has been persisted yet
pub const EXAMPLE_SOURCE: &str = r#"#include <iostream>
#include <algorithm>
#include <functional>
#include <iterator>
#include <cstdlib>
#include <ctime>

template <typename T, int size> bool is_sorted(T(&array)[size]) {
  return std::adjacent_find(array, array + size, std::greater<T>()) ==
         array + size;
}

int main() {
  std::srand(std::time(0));

  int list[] = {1, 2, 3, 4, 5, 6, 7, 8, 9};

  do {
    std::random_shuffle(list, list + 9);
  } while (is_sorted(list));

  int score = 0;

  do {
    std::cout << "Current list: ";
    std::copy(list, list + 9, std::ostream_iterator<int>(std::cout, " "));

    int rev;
    while (true) {
      std::cout << "\nDigits to reverse? ";
      std::cin >> rev;
      if (rev > 1 && rev < 10)
        break;
      std::cout << "Please enter a value between 2 and 9.";
    }

    ++score;
    std::reverse(list, list + rev);
  } while (!is_sorted(list));

  std::cout << "Congratulations, you sorted the list.\n"
            << "You needed " << score << " reversals." << std::endl;
  return 0;
}
"#;
